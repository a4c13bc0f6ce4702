//! Message feed: the client-side copy of the store's ordered collection.

use crate::models::Message;

use super::cache::MessageCache;

/// Local message list, replaced wholesale by every snapshot.
#[derive(Default)]
pub struct Feed {
    messages: Vec<Message>,
    cache: Option<MessageCache>,
    /// Set once a snapshot from the store has been applied.
    synced: bool,
}

impl Feed {
    /// Start from the cached mirror, if one is configured.
    pub fn with_cache(cache: MessageCache) -> Self {
        let messages = cache.load();
        tracing::debug!(
            "Loaded {} cached messages from {}",
            messages.len(),
            cache.path().display()
        );
        Self {
            messages,
            cache: Some(cache),
            synced: false,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_synced(&self) -> bool {
        self.synced
    }

    /// Replace the list with a full snapshot from the store.
    pub fn apply_snapshot(&mut self, snapshot: Vec<Message>) {
        self.messages = snapshot;
        self.synced = true;
        if let Some(ref cache) = self.cache {
            if let Err(e) = cache.store(&self.messages) {
                tracing::warn!("Failed to mirror feed: {:#}", e);
            }
        }
    }
}
