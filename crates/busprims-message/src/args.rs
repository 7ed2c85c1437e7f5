//! Argument encoding and the forward-only argument cursor.
//!
//! Each argument in a body is `code (1B) | length (4B LE) | payload`. The
//! length prefix lets readers step over codes they do not understand.

use std::fmt;

use bytes::{BufMut, BytesMut};

use crate::error::{MessageError, Result};
use crate::value::{TypeTag, Value};

/// Code byte plus length prefix.
pub const ARG_HEADER_SIZE: usize = 5;

/// Runtime type of the argument under a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    Known(TypeTag),
    /// A type code this crate does not model.
    Unknown(u8),
}

impl ArgType {
    pub fn from_code(code: u8) -> Self {
        match TypeTag::from_code(code) {
            Some(tag) => ArgType::Known(tag),
            None => ArgType::Unknown(code),
        }
    }
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgType::Known(tag) => write!(f, "{tag}"),
            ArgType::Unknown(code) => write!(f, "unknown(0x{code:02x})"),
        }
    }
}

pub(crate) fn append_raw(body: &mut BytesMut, code: u8, payload: &[u8], max: usize) -> Result<()> {
    let size = body.len() + ARG_HEADER_SIZE + payload.len();
    if size > max {
        return Err(MessageError::BodyTooLarge { size, max });
    }
    body.put_u8(code);
    body.put_u32_le(payload.len() as u32);
    body.put_slice(payload);
    Ok(())
}

/// Split the argument at `offset` into `(code, payload, next_offset)`.
fn split_arg(body: &[u8], offset: usize) -> Option<(u8, &[u8], usize)> {
    let header = body.get(offset..offset + ARG_HEADER_SIZE)?;
    let len = u32::from_le_bytes([header[1], header[2], header[3], header[4]]) as usize;
    let start = offset + ARG_HEADER_SIZE;
    let end = start.checked_add(len)?;
    let payload = body.get(start..end)?;
    Some((header[0], payload, end))
}

/// Check that `body` is a sequence of well-formed arguments.
///
/// Payloads of known types must decode; unknown codes only need a valid
/// length. Returns the argument count.
pub(crate) fn validate_body(body: &[u8]) -> Result<usize> {
    let mut offset = 0;
    let mut count = 0;
    while offset < body.len() {
        let (code, payload, next) =
            split_arg(body, offset).ok_or(MessageError::Malformed("truncated argument"))?;
        if let Some(tag) = TypeTag::from_code(code) {
            if Value::from_payload(tag, payload).is_none() {
                return Err(MessageError::Malformed("argument payload does not match its type"));
            }
        }
        offset = next;
        count += 1;
    }
    Ok(count)
}

/// Forward-only reader over a message body.
///
/// The cursor starts on the first argument. `advance` moves to the next one
/// and reports whether there is one; there is no way back.
#[derive(Debug, Clone)]
pub struct ArgCursor<'a> {
    body: &'a [u8],
    offset: usize,
    position: usize,
}

impl<'a> ArgCursor<'a> {
    pub(crate) fn new(body: &'a [u8]) -> Self {
        Self {
            body,
            offset: 0,
            position: 0,
        }
    }

    /// Zero-based index of the current argument.
    pub fn position(&self) -> usize {
        self.position
    }

    /// True when the cursor has no current argument.
    pub fn is_exhausted(&self) -> bool {
        self.offset >= self.body.len()
    }

    /// Type of the current argument, `None` past the end.
    pub fn current_type(&self) -> Option<ArgType> {
        split_arg(self.body, self.offset).map(|(code, _, _)| ArgType::from_code(code))
    }

    /// Value of the current argument, `None` past the end or for unknown types.
    pub fn read(&self) -> Option<Value> {
        let (code, payload, _) = split_arg(self.body, self.offset)?;
        Value::from_payload(TypeTag::from_code(code)?, payload)
    }

    /// Step past the current argument. Returns false when no argument follows.
    pub fn advance(&mut self) -> bool {
        match split_arg(self.body, self.offset) {
            Some((_, _, next)) => {
                self.offset = next;
                self.position += 1;
                !self.is_exhausted()
            }
            None => false,
        }
    }
}
