//! Clients for the external services and the one-shot commands built on them.

mod chat;
pub mod client;
pub mod cloudinary;
pub mod firestore;
pub mod gemini;

pub use chat::{
    ask_ai, build_room, read_history, resolve_speaker, send_message, show_config, upload_image,
    watch,
};
