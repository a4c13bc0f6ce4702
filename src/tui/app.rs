//! TUI application state and main event loop

use std::time::Duration;

use anyhow::Result;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use ratatui::DefaultTerminal;

use super::backend::{Backend, BackendCommand, BackendResponse};
use super::compose::{ComposeState, InputMode};
use super::debug_log::DebugLogState;
use super::log_capture::LogBuffer;
use super::messages::{LOADING_TEXT, UPLOADING_TEXT};
use super::scroll::ScrollTracker;
use super::ui;
use crate::api;
use crate::config::Config;
use crate::room::cache::MessageCache;
use crate::room::feed::Feed;
use crate::room::{ReplyOutcome, RoomError, UploadOutcome};

/// Target frame rate for UI updates (~30 fps)
const FRAME_DURATION_MS: u64 = 33;

/// Lines moved by PageUp/PageDown.
const PAGE_LINES: usize = 10;

/// Application state
pub struct App {
    /// Whether the app should exit
    pub should_exit: bool,
    /// Selectable identities; `speaker_idx` points at the current one.
    pub speakers: Vec<String>,
    pub speaker_idx: usize,
    pub feed: Feed,
    pub scroll: ScrollTracker,
    pub compose: ComposeState,
    /// Message draft parked while the image path is being typed.
    saved_draft: String,
    /// Set while an AI request or upload is in flight, holding the text
    /// shown in its place. Input is disabled meanwhile.
    pub busy: Option<&'static str>,
    /// Connection state description
    pub connection_state: String,
    pub status_message: Option<String>,
    pub status_is_error: bool,
    pub show_help: bool,
    pub debug_log: DebugLogState,
}

impl App {
    /// `speaker` is selected initially; it is added to the list if it is
    /// not one of the configured speakers.
    pub fn new(mut speakers: Vec<String>, speaker: String, feed: Feed, debug_log: DebugLogState) -> Self {
        let speaker_idx = match speakers.iter().position(|s| *s == speaker) {
            Some(i) => i,
            None => {
                speakers.push(speaker);
                speakers.len() - 1
            }
        };
        Self {
            should_exit: false,
            speakers,
            speaker_idx,
            feed,
            scroll: ScrollTracker::default(),
            compose: ComposeState::default(),
            saved_draft: String::new(),
            busy: None,
            connection_state: "連線中...".to_string(),
            status_message: None,
            status_is_error: false,
            show_help: false,
            debug_log,
        }
    }

    pub fn speaker(&self) -> &str {
        &self.speakers[self.speaker_idx]
    }

    fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some(msg.into());
        self.status_is_error = false;
    }

    fn set_error(&mut self, msg: impl Into<String>) {
        self.status_message = Some(msg.into());
        self.status_is_error = true;
    }

    /// Handle a key press. Returns a command for the backend, if any.
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<BackendCommand> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        if self.show_help {
            self.show_help = false;
            return None;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let shift = key.modifiers.contains(KeyModifiers::SHIFT);

        match key.code {
            KeyCode::Char('c') | KeyCode::Char('q') if ctrl => {
                self.should_exit = true;
                return None;
            }
            KeyCode::F(1) => {
                self.show_help = true;
                return None;
            }
            KeyCode::F(2) => {
                self.speaker_idx = (self.speaker_idx + 1) % self.speakers.len();
                tracing::debug!("Speaking as {}", self.speaker());
                return None;
            }
            KeyCode::Char('d') if ctrl => {
                self.debug_log.toggle();
                return None;
            }
            KeyCode::Char('g') if ctrl => {
                self.scroll.scroll_to_bottom();
                return None;
            }
            KeyCode::Home if ctrl => {
                self.scroll.scroll_to_top();
                return None;
            }
            KeyCode::Up if shift && self.debug_log.visible => {
                self.debug_log.scroll_up(1);
                return None;
            }
            KeyCode::Down if shift && self.debug_log.visible => {
                self.debug_log.scroll_down(1);
                return None;
            }
            KeyCode::Up => {
                self.scroll.scroll_up(1);
                return None;
            }
            KeyCode::Down => {
                self.scroll.scroll_down(1);
                return None;
            }
            KeyCode::PageUp => {
                self.scroll.scroll_up(PAGE_LINES);
                return None;
            }
            KeyCode::PageDown => {
                self.scroll.scroll_down(PAGE_LINES);
                return None;
            }
            _ => {}
        }

        // Everything below edits or submits the compose box.
        if self.busy.is_some() {
            return None;
        }

        match key.code {
            KeyCode::Enter => self.submit(),
            KeyCode::Char('a') if ctrl => self.ask(),
            KeyCode::Char('o') if ctrl => {
                if self.compose.mode == InputMode::Message {
                    self.compose.begin_image_path(&mut self.saved_draft);
                }
                None
            }
            KeyCode::Char('u') if ctrl => {
                self.compose.clear();
                None
            }
            KeyCode::Esc => {
                if self.compose.mode == InputMode::ImagePath {
                    self.leave_image_mode();
                }
                None
            }
            KeyCode::Char(c) if !ctrl => {
                self.compose.insert_char(c);
                None
            }
            KeyCode::Backspace => {
                self.compose.backspace();
                None
            }
            KeyCode::Delete => {
                self.compose.delete();
                None
            }
            KeyCode::Left => {
                self.compose.move_left();
                None
            }
            KeyCode::Right => {
                self.compose.move_right();
                None
            }
            KeyCode::Home => {
                self.compose.move_home();
                None
            }
            KeyCode::End => {
                self.compose.move_end();
                None
            }
            _ => None,
        }
    }

    fn leave_image_mode(&mut self) {
        let draft = std::mem::take(&mut self.saved_draft);
        self.compose.end_image_path(draft);
    }

    fn submit(&mut self) -> Option<BackendCommand> {
        match self.compose.mode {
            InputMode::Message => {
                let text = self.compose.take()?;
                self.status_message = None;
                self.scroll.scroll_to_bottom();
                Some(BackendCommand::Send {
                    speaker: self.speaker().to_string(),
                    text,
                })
            }
            InputMode::ImagePath => {
                // The path field is cleared whatever happens next.
                let path = self.compose.input.trim().to_string();
                self.leave_image_mode();
                if path.is_empty() {
                    return None;
                }
                self.busy = Some(UPLOADING_TEXT);
                self.set_status(UPLOADING_TEXT);
                Some(BackendCommand::Upload {
                    speaker: self.speaker().to_string(),
                    path: path.into(),
                })
            }
        }
    }

    fn ask(&mut self) -> Option<BackendCommand> {
        if self.compose.mode != InputMode::Message {
            return None;
        }
        let text = self.compose.take()?;
        self.busy = Some(LOADING_TEXT);
        self.status_message = None;
        self.scroll.scroll_to_bottom();
        Some(BackendCommand::Ask {
            speaker: self.speaker().to_string(),
            text,
        })
    }

    /// Apply a backend response to the UI state.
    pub fn handle_response(&mut self, resp: BackendResponse) {
        match resp {
            BackendResponse::Snapshot(messages) => {
                self.feed.apply_snapshot(messages);
                self.connection_state = "已連線".to_string();
            }
            BackendResponse::FeedClosed => {
                self.connection_state = "連線中斷".to_string();
                self.set_error("訊息同步已停止");
            }
            BackendResponse::Sent(Ok(_)) => {}
            BackendResponse::Sent(Err(e)) => {
                tracing::error!("Send failed: {}", e);
                self.set_error(format!("訊息送出失敗：{}", e));
            }
            BackendResponse::AiFinished(result) => {
                match result {
                    Ok(Some(reply)) if reply.outcome != ReplyOutcome::Answered => {
                        self.set_error(reply.content);
                    }
                    Ok(_) => {}
                    Err(RoomError::Busy) => {
                        self.set_error("AI 正在回應中，請稍候");
                        return;
                    }
                    Err(e) => self.set_error(format!("AI 請求失敗：{}", e)),
                }
                self.busy = None;
            }
            BackendResponse::Uploaded(result) => {
                match result {
                    Ok(UploadOutcome::Posted { .. }) => self.set_status("圖片已上傳"),
                    Ok(UploadOutcome::Failed { alert }) => self.set_error(alert),
                    Err(RoomError::Busy) => {
                        self.set_error("AI 正在回應中，請稍候");
                        return;
                    }
                    Err(e) => self.set_error(format!("圖片上傳失敗：{}", e)),
                }
                self.busy = None;
            }
        }
    }
}

/// Run the TUI until the user quits.
///
/// `logs` receives the tracing output while the alternate screen is active.
pub async fn run(config: Config, offline: bool, speaker: String, logs: LogBuffer) -> Result<()> {
    let room = api::build_room(&config, offline)?;

    let feed = if config.cache_messages && !offline {
        match MessageCache::default_location() {
            Ok(cache) => Feed::with_cache(cache),
            Err(e) => {
                tracing::warn!("Message cache unavailable: {:#}", e);
                Feed::default()
            }
        }
    } else {
        Feed::default()
    };

    let mut app = App::new(
        room.speakers().to_vec(),
        speaker,
        feed,
        DebugLogState::new(logs),
    );
    let mut backend = Backend::start(room);

    // ratatui::init installs a panic hook that restores the terminal.
    let mut terminal = ratatui::init();
    let result = run_app(&mut terminal, &mut app, &mut backend).await;
    ratatui::restore();
    result
}

async fn run_app(terminal: &mut DefaultTerminal, app: &mut App, backend: &mut Backend) -> Result<()> {
    let mut events = EventStream::new();
    let mut tick = tokio::time::interval(Duration::from_millis(FRAME_DURATION_MS));

    while !app.should_exit {
        app.debug_log.refresh();
        terminal.draw(|frame| ui::render(frame, app))?;

        tokio::select! {
            event = events.next() => match event {
                Some(Ok(Event::Key(key))) => {
                    if let Some(cmd) = app.handle_key(key) {
                        backend.send(cmd);
                    }
                }
                // Resize and friends: redrawn on the next pass.
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => break,
            },
            Some(resp) = backend.recv() => app.handle_response(resp),
            _ = tick.tick() => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Message, Role};
    use crate::room::{AiReply, AI_FALLBACK, UPLOAD_FAILED_ALERT};
    use std::path::PathBuf;

    fn app() -> App {
        App::new(
            vec!["阿庭".into(), "阿金".into()],
            "阿庭".into(),
            Feed::default(),
            DebugLogState::new(LogBuffer::new()),
        )
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            assert!(app.handle_key(key(KeyCode::Char(c))).is_none());
        }
    }

    #[test]
    fn test_enter_sends_trimmed_text_as_current_speaker() {
        let mut app = app();
        type_text(&mut app, "  Hello ");
        let cmd = app.handle_key(key(KeyCode::Enter));
        assert_eq!(
            cmd,
            Some(BackendCommand::Send {
                speaker: "阿庭".into(),
                text: "Hello".into()
            })
        );
        assert!(app.compose.input.is_empty());
        assert!(app.busy.is_none());
    }

    #[test]
    fn test_blank_enter_sends_nothing() {
        let mut app = app();
        type_text(&mut app, "   ");
        assert!(app.handle_key(key(KeyCode::Enter)).is_none());
    }

    #[test]
    fn test_f2_cycles_speakers() {
        let mut app = app();
        app.handle_key(key(KeyCode::F(2)));
        assert_eq!(app.speaker(), "阿金");
        app.handle_key(key(KeyCode::F(2)));
        assert_eq!(app.speaker(), "阿庭");
    }

    #[test]
    fn test_unknown_initial_speaker_is_selectable() {
        let app = App::new(
            vec!["阿庭".into()],
            "訪客".into(),
            Feed::default(),
            DebugLogState::new(LogBuffer::new()),
        );
        assert_eq!(app.speaker(), "訪客");
        assert_eq!(app.speakers.len(), 2);
    }

    #[test]
    fn test_ask_disables_input_until_reply() {
        let mut app = app();
        app.handle_key(key(KeyCode::F(2)));
        type_text(&mut app, "How are you?");
        let cmd = app.handle_key(ctrl('a'));
        assert_eq!(
            cmd,
            Some(BackendCommand::Ask {
                speaker: "阿金".into(),
                text: "How are you?".into()
            })
        );
        assert_eq!(app.busy, Some(LOADING_TEXT));

        // Typing and a second request are ignored while busy.
        type_text(&mut app, "more");
        assert!(app.compose.input.is_empty());
        assert!(app.handle_key(ctrl('a')).is_none());

        app.handle_response(BackendResponse::AiFinished(Ok(Some(AiReply {
            content: "I'm fine".into(),
            outcome: ReplyOutcome::Answered,
        }))));
        assert!(app.busy.is_none());
        assert!(app.status_message.is_none());
    }

    #[test]
    fn test_failed_ai_reply_is_reported() {
        let mut app = app();
        app.busy = Some(LOADING_TEXT);
        app.handle_response(BackendResponse::AiFinished(Ok(Some(AiReply {
            content: AI_FALLBACK.into(),
            outcome: ReplyOutcome::Failed,
        }))));
        assert!(app.busy.is_none());
        assert!(app.status_is_error);
        assert_eq!(app.status_message.as_deref(), Some(AI_FALLBACK));
    }

    #[test]
    fn test_image_mode_uploads_and_restores_draft() {
        let mut app = app();
        type_text(&mut app, "draft");
        app.handle_key(ctrl('o'));
        assert_eq!(app.compose.mode, InputMode::ImagePath);

        type_text(&mut app, "/tmp/cat.png");
        let cmd = app.handle_key(key(KeyCode::Enter));
        assert_eq!(
            cmd,
            Some(BackendCommand::Upload {
                speaker: "阿庭".into(),
                path: PathBuf::from("/tmp/cat.png"),
            })
        );
        assert_eq!(app.busy, Some(UPLOADING_TEXT));
        assert_eq!(app.status_message.as_deref(), Some(UPLOADING_TEXT));
        assert_eq!(app.compose.mode, InputMode::Message);
        assert_eq!(app.compose.input, "draft");

        app.handle_response(BackendResponse::Uploaded(Ok(UploadOutcome::Failed {
            alert: UPLOAD_FAILED_ALERT,
        })));
        assert!(app.busy.is_none());
        assert!(app.status_is_error);
        assert_eq!(app.status_message.as_deref(), Some(UPLOAD_FAILED_ALERT));
    }

    #[test]
    fn test_esc_cancels_image_mode() {
        let mut app = app();
        app.handle_key(ctrl('o'));
        type_text(&mut app, "/tmp/x.png");
        assert!(app.handle_key(key(KeyCode::Esc)).is_none());
        assert_eq!(app.compose.mode, InputMode::Message);
        assert!(app.compose.input.is_empty());
        assert!(app.busy.is_none());
    }

    #[test]
    fn test_ctrl_u_clears_compose() {
        let mut app = app();
        type_text(&mut app, "oops");
        app.handle_key(ctrl('u'));
        assert!(app.compose.input.is_empty());
    }

    #[test]
    fn test_snapshot_updates_feed_and_connection() {
        let mut app = app();
        app.handle_response(BackendResponse::Snapshot(vec![Message {
            id: "1".into(),
            role: Role::User,
            speaker: "阿金".into(),
            content: "hi".into(),
            image_url: None,
            timestamp: None,
        }]));
        assert_eq!(app.feed.messages().len(), 1);
        assert!(app.feed.is_synced());
        assert_eq!(app.connection_state, "已連線");
    }

    #[test]
    fn test_help_closes_on_any_key() {
        let mut app = app();
        app.handle_key(key(KeyCode::F(1)));
        assert!(app.show_help);
        assert!(app.handle_key(key(KeyCode::Char('x'))).is_none());
        assert!(!app.show_help);
        assert!(app.compose.input.is_empty());
    }

    #[test]
    fn test_ctrl_q_quits() {
        let mut app = app();
        app.handle_key(ctrl('q'));
        assert!(app.should_exit);
    }
}
