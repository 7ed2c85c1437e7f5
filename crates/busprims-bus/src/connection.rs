use std::fmt;
use std::time::Duration;

use busprims_message::Message;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::match_rule::MatchRule;
use crate::pending::PendingCall;

/// Outcome of asking the bus for a well-known name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameReply {
    /// The name was free and now belongs to this connection.
    PrimaryOwner,
    /// This connection already owned the name.
    AlreadyOwner,
    /// Another connection owns the name.
    NotOwner,
}

impl NameReply {
    /// True when this connection owns the name after the request.
    pub fn is_owner(self) -> bool {
        matches!(self, NameReply::PrimaryOwner | NameReply::AlreadyOwner)
    }
}

impl fmt::Display for NameReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NameReply::PrimaryOwner => "primary owner",
            NameReply::AlreadyOwner => "already owner",
            NameReply::NotOwner => "not owner",
        })
    }
}

/// One client connection to a bus.
///
/// Sending consumes the message; dropping a received message releases it.
pub trait Connection: Send {
    /// Unique name assigned by the bus (`:1.N`).
    fn unique_name(&self) -> &str;

    fn request_name(&mut self, name: &str) -> Result<NameReply>;

    /// Ask the bus to deliver signals accepted by `rule`.
    fn add_match(&mut self, rule: &MatchRule) -> Result<()>;

    /// Send without expecting a reply. Returns the assigned serial.
    fn send(&mut self, msg: Message) -> Result<u32>;

    /// Send a method call and get a handle on its reply, bounded by `timeout`.
    fn send_with_reply(&mut self, msg: Message, timeout: Duration) -> Result<PendingCall>;

    /// Next queued inbound message, without blocking.
    fn pop_message(&mut self) -> Result<Option<Message>>;

    /// Push buffered outbound data to the bus.
    fn flush(&mut self) -> Result<()>;
}

/// Something connections can be opened on.
pub trait Bus {
    type Conn: Connection + 'static;

    fn connect(&self) -> Result<Self::Conn>;
}

/// Per-connection serial numbers: start at 1, never 0.
#[derive(Debug, Default)]
pub(crate) struct Serials(u32);

impl Serials {
    pub(crate) fn next(&mut self) -> u32 {
        self.0 = self.0.wrapping_add(1);
        if self.0 == 0 {
            self.0 = 1;
        }
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serials_skip_zero() {
        let mut serials = Serials(u32::MAX - 1);
        assert_eq!(serials.next(), u32::MAX);
        assert_eq!(serials.next(), 1);
        assert_eq!(serials.next(), 2);
    }

    #[test]
    fn ownership() {
        assert!(NameReply::PrimaryOwner.is_owner());
        assert!(NameReply::AlreadyOwner.is_owner());
        assert!(!NameReply::NotOwner.is_owner());
    }

    #[test]
    fn name_reply_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&NameReply::NotOwner).unwrap(),
            "\"not_owner\""
        );
    }
}
