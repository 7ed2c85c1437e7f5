use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use busprims_frame::{FrameError, FrameReader, FrameWriter, CONTROL, DEFAULT_MAX_PAYLOAD, MESSAGE};
use busprims_message::{decode_message, encode_message, Message};
use busprims_transport::{BusStream, SocketListener, TransportError};
use bytes::BytesMut;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::control::{ControlReply, ControlRequest, PROTOCOL_NAME, PROTOCOL_VERSION};
use crate::error::Result;
use crate::match_rule::MatchRule;
use crate::router::{Deliver, Router};

/// Daemon settings.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Sleep between accept attempts when nobody is connecting.
    pub accept_poll_interval: Duration,
    /// Largest frame payload accepted from or sent to clients.
    pub max_payload: usize,
    /// Bound on a single write to a client before it is considered stuck.
    pub write_timeout: Duration,
    /// Permission bits for the socket file.
    pub socket_mode: u32,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            accept_poll_interval: Duration::from_millis(20),
            max_payload: DEFAULT_MAX_PAYLOAD,
            write_timeout: Duration::from_secs(5),
            socket_mode: SocketListener::DEFAULT_SOCKET_MODE,
        }
    }
}

/// Serves a bus on a Unix domain socket.
///
/// Each client gets its own session thread. The daemon owns the routing table;
/// names are released when their client disconnects.
pub struct BusDaemon {
    listener: SocketListener,
    router: Arc<Router>,
    config: DaemonConfig,
}

struct Session {
    unique: String,
    stream: BusStream,
    handle: JoinHandle<()>,
}

impl BusDaemon {
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        Self::bind_with_config(path, DaemonConfig::default())
    }

    pub fn bind_with_config(path: impl AsRef<Path>, config: DaemonConfig) -> Result<Self> {
        let listener = SocketListener::bind_with_mode(path, config.socket_mode)?;
        Ok(Self {
            listener,
            router: Router::new(),
            config,
        })
    }

    /// Bound socket path.
    pub fn path(&self) -> &Path {
        self.listener.path()
    }

    /// Unique name of the client owning `name`, if any.
    pub fn name_owner(&self, name: &str) -> Option<String> {
        self.router.owner_of(name)
    }

    /// Accept and serve clients until `cancel` fires, then close every session.
    pub fn run(&self, cancel: &CancellationToken) -> Result<()> {
        info!(path = %self.path().display(), "bus daemon listening");
        let mut sessions: Vec<Session> = Vec::new();

        while !cancel.is_cancelled() {
            match self.listener.try_accept() {
                Ok(Some(stream)) => match self.start_session(stream) {
                    Ok(session) => sessions.push(session),
                    Err(err) => warn!(error = %err, "failed to start client session"),
                },
                Ok(None) => thread::sleep(self.config.accept_poll_interval),
                Err(err) => {
                    warn!(error = %err, "accept failed");
                    thread::sleep(self.config.accept_poll_interval);
                }
            }
            reap_finished(&mut sessions);
        }

        info!(sessions = sessions.len(), "bus daemon shutting down");
        for session in &sessions {
            if let Err(err) = session.stream.shutdown() {
                debug!(unique_name = %session.unique, error = %err, "session shutdown failed");
            }
        }
        for session in sessions {
            join_session(session);
        }
        Ok(())
    }

    fn start_session(&self, stream: BusStream) -> Result<Session> {
        stream.set_write_timeout(Some(self.config.write_timeout))?;
        let reader = FrameReader::with_max_payload(stream.try_clone()?, self.config.max_payload);
        let outbox = Arc::new(SocketOutbox::new(
            stream.try_clone()?,
            self.config.max_payload,
        ));
        let unique = self.router.register(outbox.clone());

        match stream.peer_credentials() {
            Some(creds) => info!(
                unique_name = %unique,
                pid = creds.pid,
                uid = creds.uid,
                gid = creds.gid,
                "client connected"
            ),
            None => info!(unique_name = %unique, "client connected"),
        }

        let router = Arc::clone(&self.router);
        let session_name = unique.clone();
        let spawned = thread::Builder::new()
            .name(format!("busprims-session-{unique}"))
            .spawn(move || serve_session(router, session_name, reader, outbox));
        let handle = match spawned {
            Ok(handle) => handle,
            Err(err) => {
                self.router.disconnect(&unique);
                return Err(TransportError::from(err).into());
            }
        };

        Ok(Session {
            unique,
            stream,
            handle,
        })
    }
}

fn reap_finished(sessions: &mut Vec<Session>) {
    let mut index = 0;
    while index < sessions.len() {
        if sessions[index].handle.is_finished() {
            join_session(sessions.swap_remove(index));
        } else {
            index += 1;
        }
    }
}

fn join_session(session: Session) {
    if session.handle.join().is_err() {
        warn!(unique_name = %session.unique, "session thread panicked");
    }
}

/// Write half of one client, shared by every thread that routes to it.
struct SocketOutbox {
    writer: Mutex<FrameWriter<BusStream>>,
}

impl SocketOutbox {
    fn new(stream: BusStream, max_payload: usize) -> Self {
        Self {
            writer: Mutex::new(FrameWriter::with_max_payload(stream, max_payload)),
        }
    }

    fn send(&self, kind: u16, payload: &[u8]) -> Result<()> {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .send(kind, payload)?;
        Ok(())
    }

    fn send_control(&self, reply: &ControlReply) -> Result<()> {
        let payload = serde_json::to_vec(reply)?;
        self.send(CONTROL, &payload)
    }
}

impl Deliver for SocketOutbox {
    fn deliver(&self, msg: Message) -> Result<()> {
        let mut payload = BytesMut::new();
        encode_message(&msg, &mut payload)?;
        self.send(MESSAGE, &payload)
    }
}

fn serve_session(
    router: Arc<Router>,
    unique: String,
    mut reader: FrameReader<BusStream>,
    outbox: Arc<SocketOutbox>,
) {
    let mut greeted = false;
    loop {
        let frame = match reader.read_frame() {
            Ok(frame) => frame,
            Err(FrameError::ConnectionClosed) => break,
            Err(err) => {
                debug!(unique_name = %unique, error = %err, "session read failed");
                break;
            }
        };

        match frame.kind {
            CONTROL => {
                let reply = match serde_json::from_slice::<ControlRequest>(&frame.payload) {
                    Ok(request) => handle_control(&router, &unique, &mut greeted, request),
                    Err(err) => ControlReply::error(format!("malformed control request: {err}")),
                };
                if let Err(err) = outbox.send_control(&reply) {
                    debug!(unique_name = %unique, error = %err, "control reply failed");
                    break;
                }
            }
            MESSAGE if !greeted => {
                warn!(unique_name = %unique, "message before hello, closing session");
                break;
            }
            MESSAGE => match decode_message(frame.payload) {
                Ok(msg) => router.route(&unique, msg),
                Err(err) => warn!(unique_name = %unique, error = %err, "dropping undecodable message"),
            },
            other => debug!(unique_name = %unique, kind = other, "ignoring frame of unknown kind"),
        }
    }

    router.disconnect(&unique);
    info!(unique_name = %unique, "client disconnected");
}

fn handle_control(
    router: &Router,
    unique: &str,
    greeted: &mut bool,
    request: ControlRequest,
) -> ControlReply {
    match request {
        ControlRequest::Hello { protocol, version } => {
            if protocol != PROTOCOL_NAME || version != PROTOCOL_VERSION {
                return ControlReply::error(format!(
                    "unsupported protocol {protocol}/{version}, expected {PROTOCOL_NAME}/{PROTOCOL_VERSION}"
                ));
            }
            *greeted = true;
            ControlReply::Welcome {
                unique_name: unique.to_string(),
            }
        }
        _ if !*greeted => ControlReply::error("hello expected first"),
        ControlRequest::RequestName { name } => match router.request_name(unique, &name) {
            Ok(reply) => ControlReply::NameReply { reply },
            Err(err) => ControlReply::error(err.to_string()),
        },
        ControlRequest::AddMatch { rule } => {
            match MatchRule::parse(&rule).and_then(|rule| router.add_match(unique, rule)) {
                Ok(()) => ControlReply::Ok,
                Err(err) => ControlReply::error(err.to_string()),
            }
        }
    }
}
