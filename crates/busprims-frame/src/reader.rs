use std::io::{ErrorKind, Read};

use bytes::BytesMut;

use crate::codec::{decode_frame, Frame, DEFAULT_MAX_PAYLOAD};
use crate::error::{FrameError, Result};

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete frames from a stream, buffering partial reads.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    max_payload: usize,
}

impl<T: Read> FrameReader<T> {
    pub fn new(inner: T) -> Self {
        Self::with_max_payload(inner, DEFAULT_MAX_PAYLOAD)
    }

    pub fn with_max_payload(inner: T, max_payload: usize) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
            max_payload,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// End of stream, clean or mid-frame, is `FrameError::ConnectionClosed`.
    pub fn read_frame(&mut self) -> Result<Frame> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            if let Some(frame) = decode_frame(&mut self.buf, self.max_payload)? {
                return Ok(frame);
            }

            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };
            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }
            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}
