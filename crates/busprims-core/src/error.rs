use std::time::Duration;

use busprims_bus::BusError;
use busprims_message::MessageError;

/// Errors returned by channels, senders and listeners.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("bus error: {0}")]
    Bus(#[from] BusError),

    #[error("message error: {0}")]
    Message(#[from] MessageError),

    /// No reply arrived before the call's deadline.
    #[error("no reply within {0:?}")]
    Timeout(Duration),

    /// Waiting ended without a reply before the deadline (the bus went away).
    #[error("call completed without a reply")]
    NoReply,

    #[error("call cancelled while waiting for reply")]
    Cancelled,

    /// The peer answered with an error message.
    #[error("remote error {name}: {message}")]
    Remote { name: String, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to read configuration {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("failed to spawn listener thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("listener for {0} panicked")]
    ListenerPanicked(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
