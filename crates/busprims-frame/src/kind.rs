//! Frame kinds.
//!
//! A bus socket carries two kinds of traffic: JSON control requests between
//! a client and the daemon, and encoded bus messages.

/// Connection management (hello, name requests, match rules).
pub const CONTROL: u16 = 0;

/// An encoded bus message.
pub const MESSAGE: u16 = 1;

/// Human-readable name of a frame kind.
pub fn kind_name(kind: u16) -> &'static str {
    match kind {
        CONTROL => "CONTROL",
        MESSAGE => "MESSAGE",
        _ => "UNKNOWN",
    }
}
