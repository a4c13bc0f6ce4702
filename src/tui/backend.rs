//! Async backend: bridges the TUI event loop with the chat room.
//!
//! Uses an mpsc channel pair. The TUI sends `BackendCommand` values, and a
//! background tokio task executes them and sends `BackendResponse` values back.
//! A second task pumps feed snapshots from the store subscription.

use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::models::Message;
use crate::room::{AiReply, ChatRoom, ImageFile, RoomError, UploadOutcome, UPLOAD_FAILED_ALERT};

/// Commands sent from the TUI event loop to the async backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCommand {
    Send { speaker: String, text: String },
    Ask { speaker: String, text: String },
    Upload { speaker: String, path: PathBuf },
}

/// Responses from the async backend to the TUI.
#[derive(Debug)]
pub enum BackendResponse {
    /// Full ordered feed from the store.
    Snapshot(Vec<Message>),
    /// The subscription ended; no further snapshots will arrive.
    FeedClosed,
    Sent(Result<Option<String>, RoomError>),
    AiFinished(Result<Option<AiReply>, RoomError>),
    Uploaded(Result<UploadOutcome, RoomError>),
}

/// Handle for interacting with the backend from the TUI side.
pub struct Backend {
    cmd_tx: mpsc::UnboundedSender<BackendCommand>,
    resp_rx: mpsc::UnboundedReceiver<BackendResponse>,
    feed_task: JoinHandle<()>,
}

impl Backend {
    /// Start the command loop and the feed pump for `room`.
    pub fn start(room: ChatRoom) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (resp_tx, resp_rx) = mpsc::unbounded_channel();

        let feed_task = tokio::spawn(feed_pump(room.clone(), resp_tx.clone()));
        tokio::spawn(backend_loop(room, cmd_rx, resp_tx));

        Self {
            cmd_tx,
            resp_rx,
            feed_task,
        }
    }

    /// Send a command to the backend (non-blocking).
    pub fn send(&self, cmd: BackendCommand) {
        if self.cmd_tx.send(cmd).is_err() {
            tracing::error!("Backend channel closed -- command dropped");
        }
    }

    /// Receive a response from the backend.
    ///
    /// Returns `None` only when every sender is gone. Meant for `tokio::select!`.
    pub async fn recv(&mut self) -> Option<BackendResponse> {
        self.resp_rx.recv().await
    }
}

impl Drop for Backend {
    fn drop(&mut self) {
        self.feed_task.abort();
    }
}

/// Forward every snapshot from the room's subscription.
async fn feed_pump(room: ChatRoom, resp_tx: mpsc::UnboundedSender<BackendResponse>) {
    let mut sub = room.subscribe();
    while let Some(snapshot) = sub.next().await {
        tracing::debug!("Feed snapshot with {} messages", snapshot.len());
        if resp_tx.send(BackendResponse::Snapshot(snapshot)).is_err() {
            return;
        }
    }
    tracing::warn!("Message feed closed");
    let _ = resp_tx.send(BackendResponse::FeedClosed);
}

/// Background loop that processes commands. Each command runs on its own
/// task so a slow AI reply does not hold up plain sends.
async fn backend_loop(
    room: ChatRoom,
    mut cmd_rx: mpsc::UnboundedReceiver<BackendCommand>,
    resp_tx: mpsc::UnboundedSender<BackendResponse>,
) {
    while let Some(cmd) = cmd_rx.recv().await {
        let room = room.clone();
        let resp_tx = resp_tx.clone();

        if room.is_loading() && !matches!(cmd, BackendCommand::Send { .. }) {
            tracing::debug!("{:?} arrived while another request is in flight", cmd);
        }

        tokio::spawn(async move {
            let response = match cmd {
                BackendCommand::Send { speaker, text } => {
                    BackendResponse::Sent(room.send_message(&speaker, &text).await)
                }
                BackendCommand::Ask { speaker, text } => {
                    BackendResponse::AiFinished(room.ask_ai(&speaker, &text).await)
                }
                BackendCommand::Upload { speaker, path } => {
                    BackendResponse::Uploaded(upload(&room, &speaker, path).await)
                }
            };
            let _ = resp_tx.send(response);
        });
    }
}

async fn upload(
    room: &ChatRoom,
    speaker: &str,
    path: PathBuf,
) -> Result<UploadOutcome, RoomError> {
    let file = match tokio::task::spawn_blocking(move || ImageFile::from_path(&path)).await {
        Ok(Ok(file)) => file,
        Ok(Err(e)) => {
            tracing::error!("{:#}", e);
            return Ok(UploadOutcome::Failed {
                alert: UPLOAD_FAILED_ALERT,
            });
        }
        Err(e) => {
            tracing::error!("Image read task failed: {}", e);
            return Ok(UploadOutcome::Failed {
                alert: UPLOAD_FAILED_ALERT,
            });
        }
    };
    room.upload_image(speaker, file).await
}
