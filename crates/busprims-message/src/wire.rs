//! Byte encoding of whole messages, carried in `MESSAGE` frames.
//!
//! ```text
//! kind (1B) | serial (4B LE) | reply_serial (4B LE, 0 = none)
//! sender | destination | path | interface | member | error_name
//! body length (4B LE) | body
//! ```
//!
//! Each optional header string is `present (1B) | length (2B LE) | UTF-8`.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::args::validate_body;
use crate::error::{MessageError, Result};
use crate::message::{Message, MessageKind, MAX_BODY_SIZE};

fn put_field(dst: &mut BytesMut, field: Option<&str>) -> Result<()> {
    match field {
        Some(text) => {
            let len = u16::try_from(text.len()).map_err(|_| MessageError::HeaderTooLong {
                len: text.len(),
                max: u16::MAX as usize,
            })?;
            dst.put_u8(1);
            dst.put_u16_le(len);
            dst.put_slice(text.as_bytes());
        }
        None => dst.put_u8(0),
    }
    Ok(())
}

fn get_field(src: &mut Bytes) -> Result<Option<String>> {
    if src.remaining() < 1 {
        return Err(MessageError::Malformed("truncated header"));
    }
    if src.get_u8() == 0 {
        return Ok(None);
    }
    if src.remaining() < 2 {
        return Err(MessageError::Malformed("truncated header"));
    }
    let len = src.get_u16_le() as usize;
    if src.remaining() < len {
        return Err(MessageError::Malformed("truncated header"));
    }
    let raw = src.split_to(len);
    String::from_utf8(raw.to_vec())
        .map(Some)
        .map_err(|_| MessageError::Malformed("header field is not UTF-8"))
}

/// Append the encoding of `msg` to `dst`.
///
/// Fails with [`MessageError::HeaderTooLong`] when a header string exceeds
/// 65535 bytes; `dst` may then hold a partial encoding.
pub fn encode_message(msg: &Message, dst: &mut BytesMut) -> Result<()> {
    dst.reserve(32 + msg.body.len());
    dst.put_u8(msg.kind.code());
    dst.put_u32_le(msg.serial);
    dst.put_u32_le(msg.reply_serial.unwrap_or(0));
    for field in [
        &msg.sender,
        &msg.destination,
        &msg.path,
        &msg.interface,
        &msg.member,
        &msg.error_name,
    ] {
        put_field(dst, field.as_deref())?;
    }
    dst.put_u32_le(msg.body.len() as u32);
    dst.put_slice(&msg.body);
    Ok(())
}

/// Decode one message; the whole of `src` must be consumed.
pub fn decode_message(mut src: Bytes) -> Result<Message> {
    if src.remaining() < 9 {
        return Err(MessageError::Malformed("truncated header"));
    }
    let kind = MessageKind::from_code(src.get_u8())
        .ok_or(MessageError::Malformed("unknown message kind"))?;
    let serial = src.get_u32_le();
    let reply_serial = match src.get_u32_le() {
        0 => None,
        n => Some(n),
    };

    let sender = get_field(&mut src)?;
    let destination = get_field(&mut src)?;
    let path = get_field(&mut src)?;
    let interface = get_field(&mut src)?;
    let member = get_field(&mut src)?;
    let error_name = get_field(&mut src)?;

    if src.remaining() < 4 {
        return Err(MessageError::Malformed("missing body length"));
    }
    let body_len = src.get_u32_le() as usize;
    if body_len > MAX_BODY_SIZE {
        return Err(MessageError::BodyTooLarge {
            size: body_len,
            max: MAX_BODY_SIZE,
        });
    }
    if src.remaining() != body_len {
        return Err(MessageError::Malformed("body length mismatch"));
    }
    validate_body(&src)?;

    Ok(Message {
        kind,
        serial,
        reply_serial,
        sender,
        destination,
        path,
        interface,
        member,
        error_name,
        body: BytesMut::from(src.as_ref()),
    })
}
