/// Errors that can occur while framing bus traffic.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame header does not start with the bus magic.
    #[error("invalid frame magic (expected 0x4250 \"BP\")")]
    InvalidMagic,

    /// The payload exceeds the configured maximum size.
    #[error("frame payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the stream, possibly in the middle of a frame.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
