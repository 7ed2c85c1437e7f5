use std::time::Instant;

use busprims_bus::Connection;
use busprims_message::MessageKind;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::channel::BusChannel;
use crate::decoder::first_string;
use crate::error::{CoreError, Result};
use crate::spec::MessageSpec;

/// Send `spec` on `channel` to the channel's own object path.
///
/// Broadcast channels return `Ok(None)` once the signal is flushed. Unicast
/// channels block until the reply arrives and return its first string
/// argument, or fail with [`CoreError::Timeout`] when the channel's reply
/// timeout elapses first.
pub fn send<C: Connection>(channel: &mut BusChannel<C>, spec: &MessageSpec) -> Result<Option<String>> {
    let path = channel.object_path().to_string();
    transmit(channel, &path, spec, None)
}

/// Like [`send`], addressed to an explicit object path.
pub fn send_to<C: Connection>(
    channel: &mut BusChannel<C>,
    path: &str,
    spec: &MessageSpec,
) -> Result<Option<String>> {
    transmit(channel, path, spec, None)
}

/// Like [`send_to`], but a unicast wait ends with [`CoreError::Cancelled`]
/// as soon as `cancel` fires.
pub fn send_cancellable<C: Connection>(
    channel: &mut BusChannel<C>,
    path: &str,
    spec: &MessageSpec,
    cancel: &CancellationToken,
) -> Result<Option<String>> {
    transmit(channel, path, spec, Some(cancel))
}

fn transmit<C: Connection>(
    channel: &mut BusChannel<C>,
    path: &str,
    spec: &MessageSpec,
    cancel: Option<&CancellationToken>,
) -> Result<Option<String>> {
    let msg = channel.build(path, spec)?;
    let interface = channel.interface().to_string();

    if !channel.is_unicast() {
        let conn = channel.connection_mut();
        let serial = conn.send(msg)?;
        conn.flush()?;
        debug!(%interface, member = %spec.name, serial, "signal sent");
        return Ok(None);
    }

    let timeout = channel.reply_timeout();
    let conn = channel.connection_mut();
    let started = Instant::now();
    let mut pending = conn.send_with_reply(msg, timeout)?;
    conn.flush()?;
    debug!(%interface, member = %spec.name, serial = pending.serial(), ?timeout, "call sent, waiting for reply");

    let cancelled = match cancel {
        Some(token) => pending.block_or_cancel(token),
        None => {
            pending.block();
            false
        }
    };
    if cancelled {
        return Err(CoreError::Cancelled);
    }

    let Some(reply) = pending.steal_reply() else {
        if started.elapsed() >= timeout {
            return Err(CoreError::Timeout(timeout));
        }
        return Err(CoreError::NoReply);
    };
    drop(pending);

    if reply.kind() == MessageKind::Error {
        return Err(CoreError::Remote {
            name: reply.error_name().unwrap_or_default().to_string(),
            message: first_string(&reply).unwrap_or_default(),
        });
    }

    match first_string(&reply) {
        Ok(text) => {
            debug!(%interface, member = %spec.name, reply = %text, "reply received");
            Ok(Some(text))
        }
        Err(mismatch) => {
            warn!(%interface, member = %spec.name, %mismatch, "reply has no string argument");
            Ok(Some(String::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use busprims_bus::{Bus, ERROR_SERVICE_UNKNOWN, MemoryBus};
    use busprims_message::{Message, MessageError, Value};

    use super::*;
    use crate::channel::ChannelConfig;

    fn caller(bus: &MemoryBus, timeout: Duration) -> BusChannel<busprims_bus::MemoryConnection> {
        BusChannel::open(
            bus,
            ChannelConfig::unicast(
                "/test/method/Object",
                "test.method.Type",
                "test.method.caller",
                "test.method.server",
                timeout,
            ),
        )
        .unwrap()
    }

    /// Answer the first call with `reply_values`.
    fn serve_once(bus: &MemoryBus, reply_values: Vec<Value>) -> thread::JoinHandle<()> {
        let mut server = bus.connect().unwrap();
        server.request_name("test.method.server").unwrap();
        thread::spawn(move || loop {
            if let Some(call) = server.pop_message().unwrap() {
                let mut reply = Message::new_method_return(&call).unwrap();
                for value in &reply_values {
                    reply.append(value).unwrap();
                }
                server.send(reply).unwrap();
                return;
            }
            thread::sleep(Duration::from_millis(2));
        })
    }

    #[test]
    fn broadcast_returns_immediately() {
        let bus = MemoryBus::new();
        let mut channel = BusChannel::open(
            &bus,
            ChannelConfig::broadcast("/test/signal/Object", "test.signal.Type", "test.signal.source"),
        )
        .unwrap();
        let spec = MessageSpec::new("Tick");
        assert_eq!(send(&mut channel, &spec).unwrap(), None);
    }

    #[test]
    fn overlong_path_fails_before_anything_is_sent() {
        let bus = MemoryBus::new();
        let mut channel = caller(&bus, Duration::from_millis(50));
        let path = format!("/{}", "a".repeat(70_000));
        let err = send_to(&mut channel, &path, &MessageSpec::new("msg000A")).unwrap_err();
        assert!(matches!(err, CoreError::Message(MessageError::InvalidPath(_))));
    }

    #[test]
    fn unicast_returns_reply_string() {
        let bus = MemoryBus::new();
        let server = serve_once(&bus, vec![Value::from("pong")]);
        let mut channel = caller(&bus, Duration::from_secs(2));
        let reply = send(&mut channel, &MessageSpec::new("msg000A").with("ping")).unwrap();
        assert_eq!(reply.as_deref(), Some("pong"));
        server.join().unwrap();
    }

    #[test]
    fn non_string_reply_becomes_empty() {
        let bus = MemoryBus::new();
        let server = serve_once(&bus, vec![Value::Int32(5)]);
        let mut channel = caller(&bus, Duration::from_secs(2));
        let reply = send(&mut channel, &MessageSpec::new("msg000A").with("ping")).unwrap();
        assert_eq!(reply.as_deref(), Some(""));
        server.join().unwrap();
    }

    #[test]
    fn silent_peer_times_out() {
        let bus = MemoryBus::new();
        let mut silent = bus.connect().unwrap();
        silent.request_name("test.method.server").unwrap();
        let mut channel = caller(&bus, Duration::from_millis(60));
        let err = send(&mut channel, &MessageSpec::new("msg000A").with("ping")).unwrap_err();
        assert!(matches!(err, CoreError::Timeout(t) if t == Duration::from_millis(60)));
    }

    #[test]
    fn missing_service_is_remote_error() {
        let bus = MemoryBus::new();
        let mut channel = caller(&bus, Duration::from_secs(2));
        let err = send(&mut channel, &MessageSpec::new("msg000A").with("ping")).unwrap_err();
        match err {
            CoreError::Remote { name, .. } => assert_eq!(name, ERROR_SERVICE_UNKNOWN),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn cancellation_ends_the_wait() {
        let bus = MemoryBus::new();
        let mut silent = bus.connect().unwrap();
        silent.request_name("test.method.server").unwrap();
        let mut channel = caller(&bus, Duration::from_secs(10));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            trigger.cancel();
        });

        let err = send_cancellable(
            &mut channel,
            "/test/method/Object",
            &MessageSpec::new("msg000A").with("ping"),
            &cancel,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Cancelled));
        canceller.join().unwrap();
    }
}
