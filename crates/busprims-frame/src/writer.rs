use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::{encode_frame, Frame, DEFAULT_MAX_PAYLOAD};
use crate::error::{FrameError, Result};

/// Writes complete frames to a stream.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    max_payload: usize,
}

impl<T: Write> FrameWriter<T> {
    pub fn new(inner: T) -> Self {
        Self::with_max_payload(inner, DEFAULT_MAX_PAYLOAD)
    }

    pub fn with_max_payload(inner: T, max_payload: usize) -> Self {
        Self {
            inner,
            buf: BytesMut::new(),
            max_payload,
        }
    }

    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.send(frame.kind, frame.payload.as_ref())
    }

    /// Encode `payload` as one frame of `kind`, write it fully and flush.
    pub fn send(&mut self, kind: u16, payload: &[u8]) -> Result<()> {
        if payload.len() > self.max_payload {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.max_payload,
            });
        }

        self.buf.clear();
        encode_frame(kind, payload, &mut self.buf)?;

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::BrokenPipe => {
                    return Err(FrameError::ConnectionClosed)
                }
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::codec::decode_frame;
    use crate::kind::{CONTROL, MESSAGE};
    use crate::reader::FrameReader;

    struct ClosedSink;

    impl Write for ClosedSink {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writes_decodable_frames() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send(CONTROL, b"{}").unwrap();
        writer.write_frame(&Frame::new(MESSAGE, b"abc".to_vec())).unwrap();

        let mut wire = BytesMut::from(writer.into_inner().into_inner().as_slice());
        let first = decode_frame(&mut wire, usize::MAX).unwrap().unwrap();
        let second = decode_frame(&mut wire, usize::MAX).unwrap().unwrap();
        assert_eq!(first.kind, CONTROL);
        assert_eq!(second.payload.as_ref(), b"abc");
    }

    #[test]
    fn rejects_oversized_payload_before_writing() {
        let mut writer = FrameWriter::with_max_payload(Cursor::new(Vec::<u8>::new()), 4);
        let err = writer.send(MESSAGE, b"too long").unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 8, max: 4 }));
        assert!(writer.get_ref().get_ref().is_empty());
    }

    #[test]
    fn zero_length_write_means_closed() {
        let mut writer = FrameWriter::new(ClosedSink);
        assert!(matches!(
            writer.send(MESSAGE, b"x"),
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    #[cfg(unix)]
    fn roundtrip_over_socket_pair() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = FrameWriter::new(left);
        let mut reader = FrameReader::new(right);

        writer.send(MESSAGE, b"ping").unwrap();
        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.kind, MESSAGE);
        assert_eq!(frame.payload.as_ref(), b"ping");
    }
}
