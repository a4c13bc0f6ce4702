//! Chat session controller: the operations a user can perform in the room.
//!
//! `ChatRoom` is cheap to clone; all collaborators sit behind `Arc`s and the
//! loading flag is shared, so a clone handed to a background task still
//! observes (and respects) an operation started elsewhere.

pub mod cache;
pub mod context;
pub mod feed;
pub mod store;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::models::{Message, NewMessage};
use context::{build_turns, system_instruction, Turn, CONTEXT_WINDOW};
use store::{MessageStore, Subscription};

/// Written when the AI answered but no text could be extracted.
pub const MALFORMED_REPLY: &str = "[⚠️ AI 沒有正確回應]";

/// Written when the AI request failed.
pub const AI_FALLBACK: &str = "⚠️ 無法取得 AI 回應，請稍後再試。";

/// Shown to the user when an image could not be posted.
pub const UPLOAD_FAILED_ALERT: &str = "圖片上傳失敗，請稍後再試。";

/// Generative-text endpoint.
#[async_trait]
pub trait AiResponder: Send + Sync {
    /// Returns the generated text, `Ok(None)` when the response carried no
    /// usable text, or an error for transport and service-reported failures.
    async fn generate(&self, turns: &[Turn]) -> Result<Option<String>>;
}

/// Image upload endpoint.
#[async_trait]
pub trait MediaHost: Send + Sync {
    /// Upload and return a publicly retrievable URL.
    async fn upload(&self, file: ImageFile) -> Result<String>;
}

/// A local image selected for upload.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let mime_type = guess_mime(&file_name).to_string();
        Ok(Self {
            file_name,
            mime_type,
            bytes,
        })
    }
}

/// MIME type from the file extension.
fn guess_mime(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "heic" => "image/heic",
        _ => "application/octet-stream",
    }
}

/// Errors surfaced to callers of the room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// Another AI request or upload is still in flight.
    #[error("another request is still in progress")]
    Busy,
    #[error("message store: {0:#}")]
    Store(anyhow::Error),
}

/// How an AI invocation ended. A record is written in every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    Answered,
    Malformed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiReply {
    pub content: String,
    pub outcome: ReplyOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Posted { url: String },
    Failed { alert: &'static str },
}

/// Holds the loading flag for the lifetime of one operation.
struct LoadingGuard {
    flag: Arc<AtomicBool>,
}

impl LoadingGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self, RoomError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| RoomError::Busy)?;
        Ok(Self {
            flag: Arc::clone(flag),
        })
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[derive(Clone)]
pub struct ChatRoom {
    store: Arc<dyn MessageStore>,
    ai: Arc<dyn AiResponder>,
    media: Arc<dyn MediaHost>,
    speakers: Arc<[String]>,
    loading: Arc<AtomicBool>,
}

impl ChatRoom {
    pub fn new(
        store: Arc<dyn MessageStore>,
        ai: Arc<dyn AiResponder>,
        media: Arc<dyn MediaHost>,
        speakers: Vec<String>,
    ) -> Self {
        Self {
            store,
            ai,
            media,
            speakers: speakers.into(),
            loading: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn speakers(&self) -> &[String] {
        &self.speakers
    }

    /// True while an AI request or an upload is in flight.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    pub fn subscribe(&self) -> Subscription {
        self.store.subscribe()
    }

    pub async fn history(&self) -> Result<Vec<Message>, RoomError> {
        self.store.snapshot().await.map_err(RoomError::Store)
    }

    /// Post a text message. Blank input is ignored and returns `Ok(None)`.
    pub async fn send_message(&self, speaker: &str, text: &str) -> Result<Option<String>, RoomError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        let id = self
            .store
            .append(NewMessage::user_text(speaker, text))
            .await
            .map_err(RoomError::Store)?;
        tracing::info!("{} posted message {}", speaker, id);
        Ok(Some(id))
    }

    /// Post a message and ask the AI to reply to the recent conversation.
    ///
    /// Writes exactly one user record and exactly one assistant record.
    /// AI failures become a fallback reply instead of an error.
    pub async fn ask_ai(&self, speaker: &str, text: &str) -> Result<Option<AiReply>, RoomError> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        let _loading = LoadingGuard::acquire(&self.loading)?;

        self.send_message(speaker, text).await?;

        let reply = match self.request_reply().await {
            Ok(Some(text)) if !text.is_empty() => AiReply {
                content: text,
                outcome: ReplyOutcome::Answered,
            },
            Ok(_) => {
                tracing::warn!("AI response carried no text");
                AiReply {
                    content: MALFORMED_REPLY.to_string(),
                    outcome: ReplyOutcome::Malformed,
                }
            }
            Err(e) => {
                tracing::error!("AI request failed: {:#}", e);
                AiReply {
                    content: AI_FALLBACK.to_string(),
                    outcome: ReplyOutcome::Failed,
                }
            }
        };

        self.store
            .append(NewMessage::assistant(&reply.content))
            .await
            .map_err(RoomError::Store)?;
        Ok(Some(reply))
    }

    async fn request_reply(&self) -> Result<Option<String>> {
        let history = self.store.snapshot().await?;
        let instruction = system_instruction(&self.speakers);
        let turns = build_turns(&instruction, &history, CONTEXT_WINDOW);
        tracing::debug!("Sending {} turns to the AI", turns.len());
        self.ai.generate(&turns).await
    }

    /// Upload an image and post it as a message.
    ///
    /// Upload or write failures are reported through `UploadOutcome::Failed`
    /// and leave the store untouched.
    pub async fn upload_image(
        &self,
        speaker: &str,
        file: ImageFile,
    ) -> Result<UploadOutcome, RoomError> {
        let _loading = LoadingGuard::acquire(&self.loading)?;

        let name = file.file_name.clone();
        let posted = async {
            let url = self.media.upload(file).await?;
            self.store
                .append(NewMessage::user_image(speaker, &url))
                .await?;
            anyhow::Ok(url)
        }
        .await;

        match posted {
            Ok(url) => {
                tracing::info!("{} posted image {}", speaker, url);
                Ok(UploadOutcome::Posted { url })
            }
            Err(e) => {
                tracing::error!("Image upload of {} failed: {:#}", name, e);
                Ok(UploadOutcome::Failed {
                    alert: UPLOAD_FAILED_ALERT,
                })
            }
        }
    }
}
