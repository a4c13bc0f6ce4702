//! Message Store abstraction: append-only writes plus full-snapshot subscriptions.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::models::{Message, NewMessage};

/// Ordered, append-only collection of chat messages.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Append one record. Returns the store-assigned id.
    async fn append(&self, message: NewMessage) -> Result<String>;

    /// Subscribe to the collection ordered by timestamp ascending.
    fn subscribe(&self) -> Subscription;

    /// One-shot read: subscribe, take the first snapshot, unsubscribe.
    async fn snapshot(&self) -> Result<Vec<Message>> {
        let mut sub = self.subscribe();
        sub.next()
            .await
            .context("Message store closed before delivering a snapshot")
    }
}

/// Live view of the store.
///
/// Every value is a complete, ordered snapshot. `None` in the channel means
/// the first snapshot has not arrived yet. Dropping the subscription stops
/// the background poller, if any.
pub struct Subscription {
    rx: watch::Receiver<Option<Vec<Message>>>,
    poller: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(
        mut rx: watch::Receiver<Option<Vec<Message>>>,
        poller: Option<JoinHandle<()>>,
    ) -> Self {
        // Deliver whatever is current on the first `next()`.
        rx.mark_changed();
        Self { rx, poller }
    }

    /// Wait for the next snapshot.
    ///
    /// Returns `None` once the publishing side is gone.
    pub async fn next(&mut self) -> Option<Vec<Message>> {
        loop {
            self.rx.changed().await.ok()?;
            if let Some(snapshot) = self.rx.borrow_and_update().clone() {
                return Some(snapshot);
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
    }
}

/// In-process store used by `--offline` and by tests.
///
/// Timestamps are strictly increasing so ordering is total even when two
/// writes land within the clock's resolution.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
    tx: Arc<watch::Sender<Option<Vec<Message>>>>,
}

struct MemoryInner {
    next_id: u64,
    last_timestamp: Option<DateTime<Utc>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Some(Vec::new()));
        Self {
            inner: Arc::new(Mutex::new(MemoryInner {
                next_id: 1,
                last_timestamp: None,
            })),
            tx: Arc::new(tx),
        }
    }

    /// Current contents, ordered.
    pub fn messages(&self) -> Vec<Message> {
        self.tx.borrow().clone().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.tx.borrow().as_ref().map_or(0, Vec::len)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn append(&self, message: NewMessage) -> Result<String> {
        let (id, timestamp) = {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            let now = Utc::now();
            let timestamp = match inner.last_timestamp {
                Some(last) if now <= last => last + Duration::microseconds(1),
                _ => now,
            };
            inner.last_timestamp = Some(timestamp);
            let id = format!("mem-{}", inner.next_id);
            inner.next_id += 1;
            (id, timestamp)
        };

        let record = message.into_message(id.clone(), timestamp);
        tracing::debug!("memory store append {}", id);
        self.tx.send_modify(|snapshot| {
            snapshot.get_or_insert_with(Vec::new).push(record);
        });
        Ok(id)
    }

    fn subscribe(&self) -> Subscription {
        Subscription::new(self.tx.subscribe(), None)
    }
}
