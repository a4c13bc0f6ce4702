//! One-shot chat commands that print to stdout.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};

use super::client::build_http;
use super::cloudinary::CloudinaryClient;
use super::firestore::FirestoreStore;
use super::gemini::GeminiClient;
use crate::config::Config;
use crate::models::{format_timestamp, Message};
use crate::room::store::{MemoryStore, MessageStore};
use crate::room::{ChatRoom, ImageFile, ReplyOutcome, UploadOutcome};

/// Wire the controller to the configured services.
///
/// `offline` swaps Firestore for an in-process store.
pub fn build_room(config: &Config, offline: bool) -> Result<ChatRoom> {
    let http = build_http(config)?;
    let store: Arc<dyn MessageStore> = if offline {
        tracing::info!("Offline mode: messages live only in this process");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(FirestoreStore::new(http.clone(), &config.firebase)?)
    };
    Ok(ChatRoom::new(
        store,
        Arc::new(GeminiClient::new(http.clone(), config.gemini.clone())),
        Arc::new(CloudinaryClient::new(http, config.cloudinary.clone())),
        config.speakers.clone(),
    ))
}

/// Pick the speaker to post as. Unknown labels are allowed but flagged.
pub fn resolve_speaker(config: &Config, requested: Option<&str>) -> String {
    match requested {
        Some(name) => {
            if !config.speakers.iter().any(|s| s == name) {
                tracing::warn!(
                    "Speaker '{}' is not one of the configured speakers ({})",
                    name,
                    config.speakers.join(", ")
                );
            }
            name.to_string()
        }
        None => config.default_speaker().to_string(),
    }
}

/// One message as a single display line.
pub fn format_line(msg: &Message) -> String {
    let ts = format_timestamp(msg.timestamp);
    let body = match msg.image_url {
        Some(ref url) if msg.content.is_empty() => format!("[image] {}", url),
        Some(ref url) => format!("{} [image] {}", msg.content, url),
        None => msg.content.clone(),
    };
    if ts.is_empty() {
        format!("{}: {}", msg.speaker, body)
    } else {
        format!("[{}] {}: {}", ts, msg.speaker, body)
    }
}

/// Send a plain message.
pub async fn send_message(config: &Config, offline: bool, speaker: &str, message: &str) -> Result<()> {
    let room = build_room(config, offline)?;
    match room.send_message(speaker, message).await? {
        Some(_) => println!("Message sent."),
        None => println!("(nothing to send)"),
    }
    Ok(())
}

/// Send a message and wait for the AI reply.
pub async fn ask_ai(config: &Config, offline: bool, speaker: &str, message: &str) -> Result<()> {
    let room = build_room(config, offline)?;
    println!("AI 正在回應中...");
    match room.ask_ai(speaker, message).await? {
        Some(reply) => {
            println!("[AI] {}", reply.content);
            if reply.outcome != ReplyOutcome::Answered {
                tracing::debug!("AI reply outcome: {:?}", reply.outcome);
            }
        }
        None => println!("(nothing to send)"),
    }
    Ok(())
}

/// Upload an image file and post it.
pub async fn upload_image(config: &Config, offline: bool, speaker: &str, path: &Path) -> Result<()> {
    let room = build_room(config, offline)?;
    let file = ImageFile::from_path(path)?;
    match room.upload_image(speaker, file).await? {
        UploadOutcome::Posted { url } => {
            println!("Image posted: {}", url);
            Ok(())
        }
        UploadOutcome::Failed { alert } => bail!("{}", alert),
    }
}

/// Print the most recent messages.
pub async fn read_history(config: &Config, offline: bool, limit: usize) -> Result<()> {
    let room = build_room(config, offline)?;
    let msgs = room.history().await?;

    if msgs.is_empty() {
        println!("(no messages)");
        return Ok(());
    }

    let start = msgs.len().saturating_sub(limit);
    for msg in &msgs[start..] {
        println!("{}", format_line(msg));
    }
    Ok(())
}

/// Print messages as they arrive until Ctrl+C.
pub async fn watch(config: &Config, offline: bool) -> Result<()> {
    let room = build_room(config, offline)?;
    let mut sub = room.subscribe();
    let mut printed = 0usize;

    println!("Watching the room... (Ctrl-C to stop)");
    loop {
        tokio::select! {
            snapshot = sub.next() => {
                let Some(snapshot) = snapshot else {
                    bail!("Message feed closed");
                };
                // Snapshots only grow; a shorter one means history was rewritten elsewhere.
                if snapshot.len() < printed {
                    printed = 0;
                }
                for msg in &snapshot[printed..] {
                    println!("{}", format_line(msg));
                }
                printed = snapshot.len();
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Shutting down...");
                return Ok(());
            }
        }
    }
}

/// Print where the config lives and what is in effect.
pub fn show_config(config: &Config, init: bool) -> Result<()> {
    let path = Config::config_path()?;
    if init {
        if path.exists() {
            println!("Config already exists at {}", path.display());
        } else {
            Config::default().save()?;
            println!("Wrote default config to {}", path.display());
        }
    }
    println!("Config file: {}", path.display());
    println!("{}", toml::to_string_pretty(&config.redacted())?);
    Ok(())
}
