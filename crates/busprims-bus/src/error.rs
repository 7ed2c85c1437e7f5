use std::time::Duration;

/// Errors raised by bus connections and the daemon.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("transport error: {0}")]
    Transport(#[from] busprims_transport::TransportError),

    #[error("frame error: {0}")]
    Frame(#[from] busprims_frame::FrameError),

    #[error("message error: {0}")]
    Message(#[from] busprims_message::MessageError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The other end of the connection is gone.
    #[error("disconnected from bus: {0}")]
    Disconnected(String),

    /// The daemon refused a control request.
    #[error("bus refused request: {0}")]
    Refused(String),

    /// A control request got no answer in time.
    #[error("bus did not answer within {0:?}")]
    Timeout(Duration),

    #[error("invalid match rule {rule:?}: {reason}")]
    InvalidMatchRule { rule: String, reason: String },
}

pub type Result<T> = std::result::Result<T, BusError>;
