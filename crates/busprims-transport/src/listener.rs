use std::io::ErrorKind;
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::os::unix::net::UnixListener;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::BusStream;

/// Listening socket of the bus daemon.
///
/// The socket file is created with restrictive permissions and removed on
/// drop, unless something else has replaced it in the meantime.
pub struct SocketListener {
    listener: UnixListener,
    path: PathBuf,
    created_inode: (u64, u64),
}

impl SocketListener {
    /// Default permission mode for the daemon socket.
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;
    /// `sockaddr_un.sun_path` is 108 bytes on Linux, 104 elsewhere.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Bind the daemon socket at `path`, replacing a stale socket file.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        Self::bind_with_mode(path, Self::DEFAULT_SOCKET_MODE)
    }

    /// Bind with an explicit permission mode.
    pub fn bind_with_mode(path: impl AsRef<Path>, mode: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let len = path.as_os_str().len();
        if len >= Self::MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len,
                max: Self::MAX_PATH_LEN,
            });
        }

        let bind_err = |source: std::io::Error| TransportError::Bind {
            path: path.clone(),
            source,
        };

        // Never remove something that is not a socket.
        if let Ok(metadata) = std::fs::symlink_metadata(&path) {
            if !metadata.file_type().is_socket() {
                return Err(bind_err(std::io::Error::new(
                    ErrorKind::AlreadyExists,
                    "existing path is not a unix socket",
                )));
            }
            debug!(?path, "removing stale bus socket");
            std::fs::remove_file(&path).map_err(bind_err)?;
        }

        let listener = UnixListener::bind(&path).map_err(bind_err)?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).map_err(bind_err)?;
        listener.set_nonblocking(true).map_err(bind_err)?;

        let created = std::fs::symlink_metadata(&path).map_err(bind_err)?;
        info!(?path, "bus socket listening");

        Ok(Self {
            listener,
            path,
            created_inode: (created.dev(), created.ino()),
        })
    }

    /// Accept a pending connection without blocking.
    ///
    /// Returns `Ok(None)` when no client is waiting. Accepted streams are
    /// switched back to blocking mode.
    pub fn try_accept(&self) -> Result<Option<BusStream>> {
        match self.listener.accept() {
            Ok((stream, _addr)) => {
                stream.set_nonblocking(false).map_err(TransportError::Accept)?;
                debug!("accepted bus connection");
                Ok(Some(BusStream::from_unix(stream)))
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(err) if err.kind() == ErrorKind::Interrupted => Ok(None),
            Err(err) => Err(TransportError::Accept(err)),
        }
    }

    /// The path this socket is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SocketListener {
    fn drop(&mut self) {
        let (expected_dev, expected_ino) = self.created_inode;
        if let Ok(metadata) = std::fs::symlink_metadata(&self.path) {
            if metadata.file_type().is_socket()
                && metadata.dev() == expected_dev
                && metadata.ino() == expected_ino
            {
                debug!(path = ?self.path, "removing bus socket");
                let _ = std::fs::remove_file(&self.path);
            } else {
                debug!(path = ?self.path, "bus socket replaced; leaving it in place");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::time::{Duration, Instant};

    use super::*;
    use crate::stream::connect;

    fn temp_sock(tag: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!(
            "busprims-tx-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let sock = dir.join("bus.sock");
        (dir, sock)
    }

    fn accept_within(listener: &SocketListener, timeout: Duration) -> BusStream {
        let start = Instant::now();
        loop {
            if let Some(stream) = listener.try_accept().unwrap() {
                return stream;
            }
            assert!(start.elapsed() < timeout, "no connection accepted");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn bind_accept_connect() {
        let (dir, sock) = temp_sock("accept");
        let listener = SocketListener::bind(&sock).unwrap();
        assert!(sock.exists());

        let path = sock.clone();
        let client = std::thread::spawn(move || {
            let mut stream = connect(&path).unwrap();
            stream.write_all(b"hello").unwrap();
        });

        let mut server = accept_within(&listener, Duration::from_secs(2));
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
        client.join().unwrap();

        drop(listener);
        assert!(!sock.exists(), "socket file should be removed on drop");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn try_accept_without_client_returns_none() {
        let (dir, sock) = temp_sock("idle");
        let listener = SocketListener::bind(&sock).unwrap();
        assert!(listener.try_accept().unwrap().is_none());
        drop(listener);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn path_too_long_is_rejected() {
        let long_path = "/tmp/".to_string() + &"b".repeat(200) + ".sock";
        let result = SocketListener::bind(&long_path);
        assert!(matches!(result, Err(TransportError::PathTooLong { .. })));
    }

    #[test]
    fn default_permissions_are_owner_only() {
        let (dir, sock) = temp_sock("perms");
        let listener = SocketListener::bind(&sock).unwrap();
        let mode = std::fs::metadata(&sock).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
        drop(listener);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn refuses_to_replace_regular_file() {
        let (dir, sock) = temp_sock("file");
        std::fs::write(&sock, b"not a socket").unwrap();
        let result = SocketListener::bind(&sock);
        assert!(matches!(result, Err(TransportError::Bind { .. })));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn stale_socket_is_replaced() {
        let (dir, sock) = temp_sock("stale");
        let first = SocketListener::bind(&sock).unwrap();
        // Leak the first listener's file by forgetting its cleanup.
        std::mem::forget(first);
        let second = SocketListener::bind(&sock).unwrap();
        assert!(sock.exists());
        drop(second);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
