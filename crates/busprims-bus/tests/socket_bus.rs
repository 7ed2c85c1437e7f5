#![cfg(unix)]

use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use busprims_bus::{
    Bus, BusDaemon, BusError, Connection, MatchRule, NameReply, Result, SocketBus,
    ERROR_SERVICE_UNKNOWN,
};
use busprims_message::{Message, MessageError, MessageKind, Value};
use tokio_util::sync::CancellationToken;

struct TestDaemon {
    dir: PathBuf,
    sock_path: PathBuf,
    cancel: CancellationToken,
    handle: Option<JoinHandle<Result<()>>>,
}

impl TestDaemon {
    fn start(tag: &str) -> Self {
        let dir = PathBuf::from(format!(
            "/tmp/busprims-bus-{}-{}-{}",
            tag,
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        let sock_path = dir.join("bus.sock");

        let daemon = BusDaemon::bind(&sock_path).expect("daemon should bind");
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = thread::spawn(move || daemon.run(&token));

        Self {
            dir,
            sock_path,
            cancel,
            handle: Some(handle),
        }
    }

    fn bus(&self) -> SocketBus {
        SocketBus::new(&self.sock_path)
    }
}

impl Drop for TestDaemon {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

fn wait_for_message(conn: &mut impl Connection, within: Duration) -> Option<Message> {
    let deadline = Instant::now() + within;
    while Instant::now() < deadline {
        if let Some(msg) = conn.pop_message().expect("pop should succeed") {
            return Some(msg);
        }
        thread::sleep(Duration::from_millis(5));
    }
    None
}

#[test]
fn clients_get_distinct_unique_names() {
    let daemon = TestDaemon::start("unique");
    let a = daemon.bus().connect().expect("first client should connect");
    let b = daemon.bus().connect().expect("second client should connect");
    assert!(a.unique_name().starts_with(":1."));
    assert_ne!(a.unique_name(), b.unique_name());
}

#[test]
fn name_ownership_over_socket() {
    let daemon = TestDaemon::start("names");
    let mut a = daemon.bus().connect().expect("client should connect");
    let mut b = daemon.bus().connect().expect("client should connect");

    assert_eq!(
        a.request_name("test.signal.source").unwrap(),
        NameReply::PrimaryOwner
    );
    assert_eq!(
        a.request_name("test.signal.source").unwrap(),
        NameReply::AlreadyOwner
    );
    assert_eq!(
        b.request_name("test.signal.source").unwrap(),
        NameReply::NotOwner
    );

    let err = b.request_name("bogus").expect_err("invalid name should be refused");
    assert!(matches!(err, BusError::Refused(_)));
}

#[test]
fn signal_reaches_subscriber_over_socket() {
    let daemon = TestDaemon::start("signal");
    let mut sender = daemon.bus().connect().expect("sender should connect");
    let mut receiver = daemon.bus().connect().expect("receiver should connect");
    receiver
        .add_match(&MatchRule::signals("test.signal.Type"))
        .expect("match should be accepted");

    let mut signal =
        Message::new_signal("/test/signal/Object", "test.signal.Type", "msg000").unwrap();
    signal.append(&Value::from("asdf")).unwrap();
    signal.append(&Value::Int32(234)).unwrap();
    sender.send(signal).expect("send should succeed");
    sender.flush().expect("flush should succeed");

    let got = wait_for_message(&mut receiver, Duration::from_secs(2))
        .expect("signal should arrive");
    assert!(got.is_signal("test.signal.Type", "msg000"));
    assert_eq!(got.sender(), Some(sender.unique_name()));
    let mut args = got.args();
    assert_eq!(args.read(), Some(Value::from("asdf")));
    assert!(args.advance());
    assert_eq!(args.read(), Some(Value::Int32(234)));
}

#[test]
fn unencodable_message_fails_at_send() {
    let daemon = TestDaemon::start("oversize");
    let mut sender = daemon.bus().connect().expect("sender should connect");
    let mut receiver = daemon.bus().connect().expect("receiver should connect");
    receiver
        .add_match(&MatchRule::signals("test.signal.Type"))
        .expect("match should be accepted");

    let mut oversized =
        Message::new_signal("/test/signal/Object", "test.signal.Type", "msg000").unwrap();
    oversized.set_sender("x".repeat(70_000));
    assert!(matches!(
        sender.send(oversized),
        Err(BusError::Message(MessageError::HeaderTooLong { .. }))
    ));

    // Nothing half-written reached the wire; the next signal still gets through.
    sender
        .send(Message::new_signal("/test/signal/Object", "test.signal.Type", "Tick").unwrap())
        .expect("send should succeed");
    sender.flush().expect("flush should succeed");
    let got = wait_for_message(&mut receiver, Duration::from_secs(2))
        .expect("signal should arrive");
    assert!(got.is_signal("test.signal.Type", "Tick"));
}

#[test]
fn method_call_and_reply_over_socket() {
    let daemon = TestDaemon::start("call");
    let mut server = daemon.bus().connect().expect("server should connect");
    server.request_name("test.method.server").unwrap();

    let serving = thread::spawn(move || {
        let call = wait_for_message(&mut server, Duration::from_secs(2))
            .expect("call should arrive");
        assert!(call.is_method_call("test.method.Type", "msg000A"));
        let text = call.args().read().expect("argument expected");
        let mut reply = Message::new_method_return(&call).unwrap();
        reply
            .append(&Value::from(format!("RPLY_MSG{}", text.as_str().unwrap_or_default())))
            .unwrap();
        server.send(reply).unwrap();
        server.flush().unwrap();
    });

    let mut client = daemon.bus().connect().expect("client should connect");
    let mut call = Message::new_method_call(
        "test.method.server",
        "/test/method/Object",
        "test.method.Type",
        "msg000A",
    )
    .unwrap();
    call.append(&Value::from("hello")).unwrap();
    let mut pending = client
        .send_with_reply(call, Duration::from_secs(2))
        .expect("call should be sent");
    pending.block();
    let reply = pending.steal_reply().expect("reply should arrive");
    assert_eq!(reply.kind(), MessageKind::MethodReturn);
    assert_eq!(reply.args().read(), Some(Value::from("RPLY_MSGhello")));

    serving.join().expect("server thread should finish");
}

#[test]
fn call_to_unowned_name_returns_error() {
    let daemon = TestDaemon::start("unknown");
    let mut client = daemon.bus().connect().expect("client should connect");
    let call = Message::new_method_call("nobody.home", "/p", "a.b", "m").unwrap();
    let mut pending = client
        .send_with_reply(call, Duration::from_secs(2))
        .expect("call should be sent");
    pending.block();
    let reply = pending.steal_reply().expect("error reply should arrive");
    assert_eq!(reply.kind(), MessageKind::Error);
    assert_eq!(reply.error_name(), Some(ERROR_SERVICE_UNKNOWN));
}

#[test]
fn names_are_released_when_client_leaves() {
    let daemon = TestDaemon::start("release");
    let mut first = daemon.bus().connect().expect("client should connect");
    first.request_name("test.method.server").unwrap();
    drop(first);

    let mut second = daemon.bus().connect().expect("client should connect");
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        let reply = second.request_name("test.method.server").unwrap();
        if reply == NameReply::PrimaryOwner {
            break;
        }
        assert!(Instant::now() < deadline, "name was never released");
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn connect_without_daemon_fails() {
    let bus = SocketBus::new("/tmp/busprims-definitely-missing.sock");
    assert!(matches!(bus.connect(), Err(BusError::Transport(_))));
}
