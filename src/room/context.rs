//! Context window assembly for the AI Responder.

use crate::models::{Message, Role};

/// Most recent messages forwarded to the AI.
pub const CONTEXT_WINDOW: usize = 100;

/// Logical role of a request turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Assistant,
}

/// One role-tagged text unit sent to the AI Responder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            text: text.into(),
        }
    }
}

/// Fixed instruction describing the assistant's job and the recognised speakers.
pub fn system_instruction(speakers: &[String]) -> String {
    format!(
        "你是一個聊天室助手，能辨識並回應對話中的不同角色。角色包括{}，請根據上下文回應對話。",
        speakers.join("和")
    )
}

/// Build the request turns: instruction first, then the last `window`
/// messages oldest to newest. Only `content` is forwarded, except that an
/// image message with no text is sent as `[image] <url>`.
pub fn build_turns(instruction: &str, history: &[Message], window: usize) -> Vec<Turn> {
    let start = history.len().saturating_sub(window);
    let mut turns = Vec::with_capacity(history.len() - start + 1);
    turns.push(Turn::user(instruction));
    turns.extend(history[start..].iter().map(|msg| match msg.role {
        Role::User => Turn::user(turn_text(msg)),
        _ => Turn::assistant(turn_text(msg)),
    }));
    turns
}

fn turn_text(msg: &Message) -> String {
    match msg.image_url {
        Some(ref url) if msg.content.is_empty() => format!("[image] {}", url),
        _ => msg.content.clone(),
    }
}
