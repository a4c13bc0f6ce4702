//! On-device mirror of the message feed.
//!
//! Only used for a fast first paint. The store's feed overwrites it on every
//! snapshot and nothing is ever read back into the store.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::Message;

const CACHE_FILE: &str = "messages.json";

pub struct MessageCache {
    path: PathBuf,
}

impl MessageCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Cache file under the platform cache directory.
    pub fn default_location() -> Result<Self> {
        let proj_dirs = ProjectDirs::from("com", "chatroom-cli", "chatroom-cli")
            .context("Could not determine cache directory")?;
        Ok(Self::new(proj_dirs.cache_dir().join(CACHE_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the last mirrored feed. Missing or unreadable cache is empty.
    pub fn load(&self) -> Vec<Message> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_str(&content) {
            Ok(messages) => messages,
            Err(e) => {
                tracing::warn!("Ignoring corrupt message cache {}: {}", self.path.display(), e);
                Vec::new()
            }
        }
    }

    /// Overwrite the cache with `messages`.
    pub fn store(&self, messages: &[Message]) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).context("Failed to create cache directory")?;
        }
        let content = serde_json::to_string(messages).context("Failed to serialize messages")?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewMessage;
    use chrono::Utc;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("chatroom-cache-{}-{}", name, uuid::Uuid::new_v4()))
            .join(CACHE_FILE)
    }

    #[test]
    fn test_missing_cache_is_empty() {
        let cache = MessageCache::new(temp_path("missing"));
        assert!(cache.load().is_empty());
    }

    #[test]
    fn test_store_then_load() {
        let cache = MessageCache::new(temp_path("roundtrip"));
        let msgs = vec![
            NewMessage::user_text("阿庭", "hi").into_message("a".into(), Utc::now()),
            NewMessage::assistant("hello").into_message("b".into(), Utc::now()),
        ];
        cache.store(&msgs).unwrap();
        assert_eq!(cache.load(), msgs);

        // Overwritten, not appended.
        cache.store(&msgs[..1]).unwrap();
        assert_eq!(cache.load().len(), 1);
    }

    #[test]
    fn test_corrupt_cache_is_ignored() {
        let path = temp_path("corrupt");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{not json").unwrap();
        assert!(MessageCache::new(path).load().is_empty());
    }
}
