/// Errors raised while building or decoding messages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    #[error("invalid object path: {0:?}")]
    InvalidPath(String),

    #[error("invalid interface name: {0:?}")]
    InvalidInterface(String),

    #[error("invalid member name: {0:?}")]
    InvalidMember(String),

    #[error("invalid bus name: {0:?}")]
    InvalidBusName(String),

    #[error("invalid error name: {0:?}")]
    InvalidErrorName(String),

    /// Appending would grow the body past [`crate::MAX_BODY_SIZE`].
    #[error("message body too large ({size} bytes, max {max})")]
    BodyTooLarge { size: usize, max: usize },

    /// A header string does not fit its 16-bit wire length.
    #[error("header field too long ({len} bytes, max {max})")]
    HeaderTooLong { len: usize, max: usize },

    /// Replies can only be created for method calls.
    #[error("message is not a method call")]
    NotAMethodCall,

    /// Encoded message bytes are inconsistent.
    #[error("malformed message: {0}")]
    Malformed(&'static str),
}

pub type Result<T> = std::result::Result<T, MessageError>;
