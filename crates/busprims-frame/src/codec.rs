use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame header: magic (2) + length (4) + kind (2) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Magic bytes: "BP" (0x42 0x50).
pub const MAGIC: [u8; 2] = [0x42, 0x50];

/// Default maximum payload size: 1 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 1024 * 1024;

/// One frame read from or written to a bus socket.
#[derive(Debug, Clone)]
pub struct Frame {
    /// What the payload contains ([`crate::CONTROL`] or [`crate::MESSAGE`]).
    pub kind: u16,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(kind: u16, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    /// Header plus payload.
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Encode a frame into `dst`.
///
/// ```text
/// ┌────────────┬────────────┬───────────┬──────────────────┐
/// │ Magic (2B) │ Length     │ Kind      │ Payload          │
/// │ "BP"       │ (4B LE)    │ (2B LE)   │ (Length bytes)   │
/// └────────────┴────────────┴───────────┴──────────────────┘
/// ```
pub fn encode_frame(kind: u16, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLarge {
        size: payload.len(),
        max: u32::MAX as usize,
    })?;
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_slice(&MAGIC);
    dst.put_u32_le(len);
    dst.put_u16_le(kind);
    dst.put_slice(payload);
    Ok(())
}

/// Decode one frame from the front of `src`.
///
/// Returns `Ok(None)` until a complete frame is buffered; on success the
/// frame bytes are consumed.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }
    if src[0..2] != MAGIC {
        return Err(FrameError::InvalidMagic);
    }

    let payload_len = u32::from_le_bytes([src[2], src[3], src[4], src[5]]) as usize;
    let kind = u16::from_le_bytes([src[6], src[7]]);

    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }
    if src.len() < HEADER_SIZE + payload_len {
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();
    Ok(Some(Frame { kind, payload }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::{CONTROL, MESSAGE};

    #[test]
    fn encode_then_decode() {
        let mut buf = BytesMut::new();
        encode_frame(MESSAGE, b"signal body", &mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE + 11);

        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(frame.kind, MESSAGE);
        assert_eq!(frame.payload.as_ref(), b"signal body");
        assert!(buf.is_empty());
    }

    #[test]
    fn incomplete_header_waits() {
        let mut buf = BytesMut::from(&MAGIC[..]);
        assert!(decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().is_none());
    }

    #[test]
    fn incomplete_payload_waits() {
        let mut buf = BytesMut::new();
        encode_frame(CONTROL, b"{\"type\":\"hello\"}", &mut buf).unwrap();
        buf.truncate(HEADER_SIZE + 3);
        assert!(decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().is_none());
    }

    #[test]
    fn bad_magic() {
        let mut buf = BytesMut::from(&[0x49, 0x50, 0, 0, 0, 0, 0, 0][..]);
        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::InvalidMagic)));
    }

    #[test]
    fn oversized_payload_rejected_from_header() {
        let mut buf = BytesMut::new();
        buf.put_slice(&MAGIC);
        buf.put_u32_le(4096);
        buf.put_u16_le(MESSAGE);
        let result = decode_frame(&mut buf, 1024);
        assert!(matches!(
            result,
            Err(FrameError::PayloadTooLarge { size: 4096, max: 1024 })
        ));
    }

    #[test]
    fn back_to_back_frames() {
        let mut buf = BytesMut::new();
        encode_frame(CONTROL, b"a", &mut buf).unwrap();
        encode_frame(MESSAGE, b"", &mut buf).unwrap();

        let first = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();
        let second = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!((first.kind, first.payload.as_ref()), (CONTROL, b"a".as_ref()));
        assert_eq!(second.kind, MESSAGE);
        assert!(second.payload.is_empty());
        assert!(buf.is_empty());
    }

    #[test]
    fn wire_size_counts_header() {
        assert_eq!(Frame::new(MESSAGE, b"1234".to_vec()).wire_size(), HEADER_SIZE + 4);
    }
}
