//! Length-prefixed framing for the busprims socket protocol.
//!
//! Every frame on a bus socket is:
//! - a 2-byte magic number ("BP") for stream synchronization
//! - a 4-byte little-endian payload length
//! - a 2-byte little-endian frame kind ([`CONTROL`] or [`MESSAGE`])
//!
//! Readers always hand out complete frames.

pub mod codec;
pub mod error;
pub mod kind;
pub mod reader;
pub mod writer;

pub use codec::{decode_frame, encode_frame, Frame, DEFAULT_MAX_PAYLOAD, HEADER_SIZE};
pub use error::{FrameError, Result};
pub use kind::{kind_name, CONTROL, MESSAGE};
pub use reader::FrameReader;
pub use writer::FrameWriter;
