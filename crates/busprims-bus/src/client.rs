use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use busprims_frame::{FrameError, FrameReader, FrameWriter, CONTROL, DEFAULT_MAX_PAYLOAD, MESSAGE};
use busprims_message::{decode_message, encode_message, Message};
use busprims_transport::{BusStream, TransportError};
use bytes::BytesMut;
use tracing::{debug, warn};

use crate::connection::{Bus, Connection, NameReply, Serials};
use crate::control::{ControlReply, ControlRequest};
use crate::error::{BusError, Result};
use crate::match_rule::MatchRule;
use crate::pending::{Mailbox, PendingCall};

/// Client-side settings for [`SocketBus`].
#[derive(Debug, Clone)]
pub struct SocketBusConfig {
    /// How long to wait for the daemon to answer a control request.
    pub control_timeout: Duration,
    /// Largest frame payload accepted or sent.
    pub max_payload: usize,
}

impl Default for SocketBusConfig {
    fn default() -> Self {
        Self {
            control_timeout: Duration::from_secs(5),
            max_payload: DEFAULT_MAX_PAYLOAD,
        }
    }
}

/// A bus served by a [`crate::BusDaemon`] at a socket path.
#[derive(Debug, Clone)]
pub struct SocketBus {
    path: PathBuf,
    config: SocketBusConfig,
}

impl SocketBus {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            config: SocketBusConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SocketBusConfig) -> Self {
        self.config = config;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Bus for SocketBus {
    type Conn = SocketConnection;

    fn connect(&self) -> Result<SocketConnection> {
        SocketConnection::open(&self.path, &self.config)
    }
}

/// Connection to a bus daemon.
///
/// A background thread reads frames from the socket: messages land in the
/// mailbox (or the matching [`PendingCall`]), control replies are handed to
/// whichever request is waiting on them.
pub struct SocketConnection {
    unique: String,
    writer: FrameWriter<BusStream>,
    mailbox: Arc<Mailbox>,
    control_rx: mpsc::Receiver<ControlReply>,
    control_timeout: Duration,
    /// Requests that timed out; their replies are still due, in order.
    abandoned: usize,
    serials: Serials,
    encode_buf: BytesMut,
    reader: Option<JoinHandle<()>>,
}

impl SocketConnection {
    fn open(path: &Path, config: &SocketBusConfig) -> Result<Self> {
        let stream = busprims_transport::connect(path)?;
        let reader_stream = stream.try_clone()?;

        let mailbox = Mailbox::new();
        let (control_tx, control_rx) = mpsc::channel();
        let reader = FrameReader::with_max_payload(reader_stream, config.max_payload);
        let inbound = Arc::clone(&mailbox);
        let handle = thread::Builder::new()
            .name("busprims-reader".to_string())
            .spawn(move || read_loop(reader, inbound, control_tx))
            .map_err(TransportError::from)?;

        let mut conn = Self {
            unique: String::new(),
            writer: FrameWriter::with_max_payload(stream, config.max_payload),
            mailbox,
            control_rx,
            control_timeout: config.control_timeout,
            abandoned: 0,
            serials: Serials::default(),
            encode_buf: BytesMut::new(),
            reader: Some(handle),
        };

        match conn.control(&ControlRequest::hello())? {
            ControlReply::Welcome { unique_name } => {
                debug!(path = %path.display(), unique_name = %unique_name, "connected to bus");
                conn.unique = unique_name;
                Ok(conn)
            }
            other => Err(unexpected(&other)),
        }
    }

    fn control(&mut self, request: &ControlRequest) -> Result<ControlReply> {
        let payload = serde_json::to_vec(request)?;
        self.writer.send(CONTROL, &payload)?;
        let deadline = Instant::now() + self.control_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let reply = match self.control_rx.recv_timeout(remaining) {
                Ok(reply) => reply,
                Err(RecvTimeoutError::Timeout) => {
                    self.abandoned += 1;
                    return Err(BusError::Timeout(self.control_timeout));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(BusError::Disconnected(
                        "bus closed the connection".to_string(),
                    ))
                }
            };
            if self.abandoned > 0 {
                self.abandoned -= 1;
                debug!(?reply, "discarding reply to a timed-out control request");
                continue;
            }
            return match reply {
                ControlReply::Error { message } => Err(BusError::Refused(message)),
                reply => Ok(reply),
            };
        }
    }

    fn write_message(&mut self, msg: &Message) -> Result<()> {
        if self.mailbox.is_closed() {
            return Err(BusError::Disconnected(self.unique.clone()));
        }
        self.encode_buf.clear();
        encode_message(msg, &mut self.encode_buf)?;
        self.writer.send(MESSAGE, &self.encode_buf)?;
        Ok(())
    }
}

fn unexpected(reply: &ControlReply) -> BusError {
    BusError::Refused(format!("unexpected control reply: {reply:?}"))
}

fn read_loop(
    mut reader: FrameReader<BusStream>,
    mailbox: Arc<Mailbox>,
    control_tx: mpsc::Sender<ControlReply>,
) {
    loop {
        let frame = match reader.read_frame() {
            Ok(frame) => frame,
            Err(FrameError::ConnectionClosed) => {
                debug!("bus connection closed");
                break;
            }
            Err(err) => {
                warn!(error = %err, "reading from bus failed");
                break;
            }
        };

        match frame.kind {
            MESSAGE => match decode_message(frame.payload) {
                Ok(msg) => {
                    if mailbox.deliver(msg).is_err() {
                        break;
                    }
                }
                Err(err) => warn!(error = %err, "dropping undecodable message"),
            },
            CONTROL => match serde_json::from_slice::<ControlReply>(&frame.payload) {
                Ok(reply) => {
                    if control_tx.send(reply).is_err() {
                        break;
                    }
                }
                Err(err) => warn!(error = %err, "dropping malformed control reply"),
            },
            other => debug!(kind = other, "ignoring frame of unknown kind"),
        }
    }
    mailbox.close();
}

impl Connection for SocketConnection {
    fn unique_name(&self) -> &str {
        &self.unique
    }

    fn request_name(&mut self, name: &str) -> Result<NameReply> {
        let request = ControlRequest::RequestName {
            name: name.to_string(),
        };
        match self.control(&request)? {
            ControlReply::NameReply { reply } => Ok(reply),
            other => Err(unexpected(&other)),
        }
    }

    fn add_match(&mut self, rule: &MatchRule) -> Result<()> {
        let request = ControlRequest::AddMatch {
            rule: rule.to_string(),
        };
        match self.control(&request)? {
            ControlReply::Ok => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    fn send(&mut self, mut msg: Message) -> Result<u32> {
        let serial = self.serials.next();
        msg.set_serial(serial);
        self.write_message(&msg)?;
        Ok(serial)
    }

    fn send_with_reply(&mut self, mut msg: Message, timeout: Duration) -> Result<PendingCall> {
        let serial = self.serials.next();
        msg.set_serial(serial);
        let pending = self.mailbox.register(serial, timeout);
        self.write_message(&msg)?;
        Ok(pending)
    }

    fn pop_message(&mut self) -> Result<Option<Message>> {
        self.mailbox.pop()
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

impl Drop for SocketConnection {
    fn drop(&mut self) {
        if let Err(err) = self.writer.get_ref().shutdown() {
            debug!(error = %err, "socket shutdown failed");
        }
        if let Some(handle) = self.reader.take() {
            if handle.join().is_err() {
                warn!("bus reader thread panicked");
            }
        }
        self.mailbox.close();
    }
}
