//! Messaging transports: the phone's SMS facade and a Telegram bot account.

pub mod sl4a;
pub mod telegram;

use thiserror::Error;

pub use sl4a::{Sl4aClient, Sl4aConfig};
pub use telegram::{TelegramConfig, TelegramTransport};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{method} failed: {message}")]
    Rpc { method: String, message: String },
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("connection closed by peer")]
    Closed,
    #[error("not connected")]
    NotConnected,
    #[error("Telegram API error: {0}")]
    Telegram(#[from] teloxide::RequestError),
}
