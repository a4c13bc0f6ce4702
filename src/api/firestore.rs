//! Firestore REST client (Message Store).
//!
//! Writes go through `documents:commit` so the server stamps `timestamp`
//! with its request time. The feed re-runs an ordered `runQuery` on an
//! interval and publishes only snapshots that differ from the last one.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};

use super::client::check_response;
use crate::config::FirebaseConfig;
use crate::models::{Message, NewMessage, Role};
use crate::room::store::{MessageStore, Subscription};

const FIRESTORE_BASE: &str = "https://firestore.googleapis.com/v1";

// -- Response types for runQuery --

#[derive(Debug, Deserialize)]
struct RunQueryItem {
    document: Option<Document>,
}

#[derive(Debug, Deserialize)]
struct Document {
    name: String,
    #[serde(default)]
    fields: HashMap<String, FieldValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldValue {
    string_value: Option<String>,
    timestamp_value: Option<String>,
}

fn string_field(value: &str) -> Value {
    json!({ "stringValue": value })
}

/// Typed Firestore fields for a new record. `timestamp` is left to the server;
/// a text message stores `imageUrl` as an explicit null.
fn encode_fields(message: &NewMessage) -> Value {
    let mut fields = Map::new();
    fields.insert("role".into(), string_field(message.role.as_str()));
    fields.insert("speaker".into(), string_field(&message.speaker));
    fields.insert("content".into(), string_field(&message.content));
    let image_url = match message.image_url {
        Some(ref url) => string_field(url),
        None => json!({ "nullValue": null }),
    };
    fields.insert("imageUrl".into(), image_url);
    Value::Object(fields)
}

fn decode_document(doc: Document) -> Message {
    let text = |key: &str| {
        doc.fields
            .get(key)
            .and_then(|f| f.string_value.clone())
    };
    let id = doc.name.rsplit('/').next().unwrap_or_default().to_string();
    let timestamp = doc
        .fields
        .get("timestamp")
        .and_then(|f| f.timestamp_value.as_deref())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|ts| ts.with_timezone(&Utc));

    Message {
        role: Role::from(text("role").unwrap_or_default()),
        speaker: text("speaker").unwrap_or_default(),
        content: text("content").unwrap_or_default(),
        image_url: text("imageUrl").filter(|u| !u.is_empty()),
        timestamp,
        id,
    }
}

fn decode_run_query(body: &str) -> Result<Vec<Message>> {
    let items: Vec<RunQueryItem> =
        serde_json::from_str(body).context("Failed to parse runQuery response")?;
    Ok(items
        .into_iter()
        .filter_map(|item| item.document)
        .map(decode_document)
        .collect())
}

#[derive(Clone)]
pub struct FirestoreStore {
    http: reqwest::Client,
    /// `projects/{p}/databases/(default)/documents`
    documents_path: String,
    collection: String,
    api_key: String,
    poll_interval: Duration,
}

impl FirestoreStore {
    pub fn new(http: reqwest::Client, config: &FirebaseConfig) -> Result<Self> {
        anyhow::ensure!(
            !config.project_id.is_empty(),
            "No Firebase project configured. Set FIREBASE_PROJECT_ID or firebase.project_id, or use --offline."
        );
        Ok(Self {
            http,
            documents_path: format!(
                "projects/{}/databases/(default)/documents",
                config.project_id
            ),
            collection: config.collection.clone(),
            api_key: config.api_key.clone(),
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(200)),
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}:{}", FIRESTORE_BASE, self.documents_path, method)
    }

    async fn post(&self, method: &str, body: &Value) -> Result<reqwest::Response> {
        let url = self.url(method);
        tracing::debug!("Firestore POST {}", url);

        let mut req = self.http.post(&url).json(body);
        if !self.api_key.is_empty() {
            req = req.query(&[("key", self.api_key.as_str())]);
        }
        let resp = req
            .send()
            .await
            .with_context(|| format!("Firestore POST {} failed", url))?;
        check_response(resp, "Firestore").await
    }

    fn commit_body(&self, id: &str, message: &NewMessage) -> Value {
        json!({
            "writes": [{
                "update": {
                    "name": format!("{}/{}/{}", self.documents_path, self.collection, id),
                    "fields": encode_fields(message),
                },
                "updateTransforms": [{
                    "fieldPath": "timestamp",
                    "setToServerValue": "REQUEST_TIME",
                }],
                "currentDocument": { "exists": false },
            }]
        })
    }

    fn query_body(&self) -> Value {
        json!({
            "structuredQuery": {
                "from": [{ "collectionId": self.collection }],
                "orderBy": [{
                    "field": { "fieldPath": "timestamp" },
                    "direction": "ASCENDING",
                }],
            }
        })
    }

    /// Full collection, ordered by timestamp ascending.
    pub async fn fetch(&self) -> Result<Vec<Message>> {
        let resp = self.post("runQuery", &self.query_body()).await?;
        let body = resp.text().await.context("Failed to read runQuery response")?;
        decode_run_query(&body)
    }
}

/// Apply one poll result to the feed channel.
///
/// Subscribers are notified only when the snapshot differs from the one they
/// already have. A failed poll is logged and leaves the feed untouched.
/// Returns whether a snapshot was published.
fn publish_snapshot(
    tx: &watch::Sender<Option<Vec<Message>>>,
    polled: Result<Vec<Message>>,
) -> bool {
    let snapshot = match polled {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::warn!("Feed poll failed: {:#}", e);
            return false;
        }
    };
    let count = snapshot.len();
    let changed = tx.send_if_modified(|current| {
        if current.as_ref() == Some(&snapshot) {
            false
        } else {
            *current = Some(snapshot);
            true
        }
    });
    if changed {
        tracing::debug!("Feed snapshot: {} messages", count);
    }
    changed
}

/// Poll `fetch` every `interval` until every subscriber is gone.
async fn poll_feed<F, Fut>(
    interval: Duration,
    mut fetch: F,
    tx: watch::Sender<Option<Vec<Message>>>,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Vec<Message>>>,
{
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        publish_snapshot(&tx, fetch().await);
        if tx.is_closed() {
            tracing::debug!("Feed has no subscribers, polling stopped");
            break;
        }
    }
}

#[async_trait]
impl MessageStore for FirestoreStore {
    async fn append(&self, message: NewMessage) -> Result<String> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.post("commit", &self.commit_body(&id, &message)).await?;
        Ok(id)
    }

    fn subscribe(&self) -> Subscription {
        let (tx, rx) = watch::channel(None);
        let store = self.clone();
        let fetch = move || {
            let store = store.clone();
            async move { store.fetch().await }
        };
        let poller = tokio::spawn(poll_feed(self.poll_interval, fetch, tx));
        Subscription::new(rx, Some(poller))
    }

    async fn snapshot(&self) -> Result<Vec<Message>> {
        self.fetch().await
    }
}
