//! Typed bus messages and their arguments.
//!
//! A [`Message`] is a signal, method call, method return or error addressed by
//! object path, interface and member. Its body is an ordered list of
//! [`Value`] arguments, appended one at a time and read back positionally
//! through an [`ArgCursor`].

pub mod args;
pub mod error;
pub mod message;
pub mod names;
pub mod value;
pub mod wire;

pub use args::{ArgCursor, ArgType};
pub use error::{MessageError, Result};
pub use message::{Message, MessageKind, MAX_BODY_SIZE};
pub use value::{TypeTag, Value};
pub use wire::{decode_message, encode_message};
