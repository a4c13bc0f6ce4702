//! Message-related models

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Speaker label written on every assistant record.
pub const AI_SPEAKER: &str = "AI";

/// Who authored a message.
///
/// Stored as a plain string. Anything other than `user`/`assistant` is kept
/// verbatim so a record written by another client still round-trips.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    User,
    Assistant,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Other(s) => s,
        }
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        match s.as_str() {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            _ => Role::Other(s),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

/// A stored chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Store-assigned document id.
    #[serde(default)]
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub speaker: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Server-assigned ordering key. `None` until the store resolves it.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Message {
    pub fn is_assistant(&self) -> bool {
        !matches!(self.role, Role::User)
    }
}

/// Payload for a store write. The store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub role: Role,
    pub speaker: String,
    pub content: String,
    pub image_url: Option<String>,
}

impl NewMessage {
    /// A text message typed by a human speaker.
    pub fn user_text(speaker: &str, content: &str) -> Self {
        Self {
            role: Role::User,
            speaker: speaker.to_string(),
            content: content.to_string(),
            image_url: None,
        }
    }

    /// An image message: empty content, URL on the media host.
    pub fn user_image(speaker: &str, url: &str) -> Self {
        Self {
            role: Role::User,
            speaker: speaker.to_string(),
            content: String::new(),
            image_url: Some(url.to_string()),
        }
    }

    /// A reply (or fallback) written on behalf of the assistant.
    pub fn assistant(content: &str) -> Self {
        Self {
            role: Role::Assistant,
            speaker: AI_SPEAKER.to_string(),
            content: content.to_string(),
            image_url: None,
        }
    }

    /// Attach store-assigned metadata.
    pub fn into_message(self, id: String, timestamp: DateTime<Utc>) -> Message {
        Message {
            id,
            role: self.role,
            speaker: self.speaker,
            content: self.content,
            image_url: self.image_url,
            timestamp: Some(timestamp),
        }
    }
}

/// Format a timestamp as `YYYY/MM/DD HH:MM:SS` in local time.
///
/// A pending (unresolved) timestamp renders as an empty string.
pub fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
    format_timestamp_in(ts, &Local)
}

pub fn format_timestamp_in<Tz>(ts: Option<DateTime<Utc>>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    match ts {
        Some(ts) => ts
            .with_timezone(tz)
            .format("%Y/%m/%d %H:%M:%S")
            .to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[test]
    fn test_role_wire_strings() {
        assert_eq!(Role::from("user".to_string()), Role::User);
        assert_eq!(Role::from("assistant".to_string()), Role::Assistant);
        assert_eq!(
            Role::from("system".to_string()),
            Role::Other("system".to_string())
        );
        assert_eq!(String::from(Role::Other("bot".into())), "bot");
    }

    #[test]
    fn test_message_json_uses_camel_case() {
        let msg = NewMessage::user_image("阿金", "https://cdn.example/a.png")
            .into_message("doc1".into(), Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap());
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["imageUrl"], "https://cdn.example/a.png");
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "");

        let back: Message = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_assistant_payload_uses_sentinel_speaker() {
        let msg = NewMessage::assistant("hi");
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.speaker, AI_SPEAKER);
        assert!(msg.image_url.is_none());
    }

    #[test]
    fn test_format_timestamp_pads_fields() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 7, 1, 2, 9).unwrap();
        let taipei = FixedOffset::east_opt(8 * 3600).unwrap();
        assert_eq!(format_timestamp_in(Some(ts), &taipei), "2024/03/07 09:02:09");
        assert_eq!(format_timestamp_in(Some(ts), &Utc), "2024/03/07 01:02:09");
    }

    #[test]
    fn test_format_timestamp_pending_is_empty() {
        assert_eq!(format_timestamp(None), "");
    }
}
