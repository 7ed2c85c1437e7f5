use std::io::{Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};

/// Identity of the process on the other end of a bus stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerCredentials {
    pub uid: u32,
    pub gid: u32,
    pub pid: u32,
}

/// A connected bus stream (one side of a client/daemon socket).
pub struct BusStream {
    inner: UnixStream,
}

impl BusStream {
    pub(crate) fn from_unix(inner: UnixStream) -> Self {
        Self { inner }
    }

    /// Set read timeout on the underlying socket.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_read_timeout(timeout).map_err(Into::into)
    }

    /// Set write timeout on the underlying socket.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_write_timeout(timeout).map_err(Into::into)
    }

    /// Duplicate the stream so reading and writing can live on different threads.
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self::from_unix(self.inner.try_clone()?))
    }

    /// Shut down both directions. A thread blocked in `read` on a clone
    /// observes end-of-stream.
    pub fn shutdown(&self) -> Result<()> {
        match self.inner.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Credentials of the connected process via `SO_PEERCRED` (Linux only).
    #[cfg(target_os = "linux")]
    pub fn peer_credentials(&self) -> Option<PeerCredentials> {
        use std::os::fd::AsRawFd;

        let fd = self.inner.as_raw_fd();
        let mut cred = libc::ucred {
            pid: 0,
            uid: 0,
            gid: 0,
        };
        let mut len = std::mem::size_of::<libc::ucred>() as libc::socklen_t;

        // SAFETY: `cred` and `len` are valid writable pointers for the provided sizes,
        // and `fd` is an open Unix socket descriptor owned by this stream.
        let rc = unsafe {
            libc::getsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_PEERCRED,
                (&mut cred as *mut libc::ucred).cast::<libc::c_void>(),
                &mut len,
            )
        };

        if rc == 0 && len as usize == std::mem::size_of::<libc::ucred>() {
            Some(PeerCredentials {
                uid: cred.uid,
                gid: cred.gid,
                pid: cred.pid as u32,
            })
        } else {
            None
        }
    }

    /// Credentials of the connected process.
    ///
    /// Returns `None` on platforms that do not expose peer credentials.
    #[cfg(not(target_os = "linux"))]
    pub fn peer_credentials(&self) -> Option<PeerCredentials> {
        None
    }
}

/// Connect to a bus daemon listening at `path` (blocking).
pub fn connect(path: impl AsRef<Path>) -> Result<BusStream> {
    let path = path.as_ref();
    let stream = UnixStream::connect(path).map_err(|e| TransportError::Connect {
        path: path.to_path_buf(),
        source: e,
    })?;
    debug!(?path, "connected to bus socket");
    Ok(BusStream::from_unix(stream))
}

impl Read for BusStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for BusStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl std::fmt::Debug for BusStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusStream").field("type", &"unix").finish()
    }
}
