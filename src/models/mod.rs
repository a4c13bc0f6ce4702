//! Data models for the chat room

mod message;

pub use message::*;
