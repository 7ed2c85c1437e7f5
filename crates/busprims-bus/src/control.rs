//! JSON payloads carried in `CONTROL` frames between a client and the daemon.
//!
//! Every request gets exactly one reply, in order.

use serde::{Deserialize, Serialize};

use crate::connection::NameReply;

/// Protocol name sent in [`ControlRequest::Hello`].
pub const PROTOCOL_NAME: &str = "busprims";
/// Protocol version sent in [`ControlRequest::Hello`].
pub const PROTOCOL_VERSION: &str = "1";

/// Client to daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlRequest {
    /// First frame on every connection.
    Hello { protocol: String, version: String },
    RequestName { name: String },
    /// Rule in `key='value'` text form.
    AddMatch { rule: String },
}

impl ControlRequest {
    pub fn hello() -> Self {
        ControlRequest::Hello {
            protocol: PROTOCOL_NAME.to_string(),
            version: PROTOCOL_VERSION.to_string(),
        }
    }
}

/// Daemon to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlReply {
    /// Answer to `Hello`, carrying the assigned unique name.
    Welcome { unique_name: String },
    NameReply { reply: NameReply },
    Ok,
    Error { message: String },
}

impl ControlReply {
    pub fn error(message: impl Into<String>) -> Self {
        ControlReply::Error {
            message: message.into(),
        }
    }
}
