use std::path::PathBuf;

/// Errors that can occur on the bus socket.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind the daemon socket.
    #[error("failed to bind bus socket {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to connect to the daemon socket.
    #[error("failed to connect to bus at {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept bus connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on an established stream.
    #[error("bus socket I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket path does not fit in `sockaddr_un`.
    #[error("bus socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },
}

pub type Result<T> = std::result::Result<T, TransportError>;
