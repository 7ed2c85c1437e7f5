#![cfg(all(unix, feature = "cli"))]

use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/buscli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn busprims(bus: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_busprims"));
    cmd.arg("--bus").arg(bus).arg("--log-level").arg("error");
    cmd
}

fn wait_for_connect(path: &Path, timeout: Duration) {
    let start = Instant::now();
    loop {
        if UnixStream::connect(path).is_ok() {
            return;
        }
        if start.elapsed() >= timeout {
            panic!("connect timeout");
        }
        thread::sleep(Duration::from_millis(25));
    }
}

fn stop(mut child: Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Retry `query` until the server has claimed its name.
fn query_until_served(bus: &Path, config: &Path, text: &str, timeout: Duration) -> Output {
    let start = Instant::now();
    loop {
        let output = busprims(bus)
            .arg("--config")
            .arg(config)
            .arg("--format")
            .arg("json")
            .arg("query")
            .arg(text)
            .arg("--timeout")
            .arg("2s")
            .output()
            .expect("query should run");
        if output.status.success() || start.elapsed() >= timeout {
            return output;
        }
        thread::sleep(Duration::from_millis(50));
    }
}

#[test]
fn query_against_serve_prints_prefixed_reply() {
    let dir = unique_temp_dir("query");
    let bus = dir.join("bus.sock");
    let config = dir.join("busprims.json");
    std::fs::write(&config, r#"{"reply_delay_ms": 50}"#).expect("config should be writable");

    let daemon = busprims(&bus)
        .arg("daemon")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("daemon should start");
    wait_for_connect(&bus, Duration::from_secs(3));

    let server = busprims(&bus)
        .arg("--config")
        .arg(&config)
        .arg("serve")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("serve should start");

    let output = query_until_served(&bus, &config, "hello", Duration::from_secs(5));
    let stdout = String::from_utf8_lossy(&output.stdout);

    stop(server);
    stop(daemon);
    let _ = std::fs::remove_dir_all(&dir);

    assert!(output.status.success(), "query failed: {output:?}");
    assert!(stdout.contains("\"reply\":\"RPLY_MSGhello\""), "stdout: {stdout}");
    assert!(stdout.contains("\"member\":\"msg000A\""));
}

#[test]
fn sendstr_reaches_receive() {
    let dir = unique_temp_dir("receive");
    let bus = dir.join("bus.sock");

    let daemon = busprims(&bus)
        .arg("daemon")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("daemon should start");
    wait_for_connect(&bus, Duration::from_secs(3));

    let out_path = dir.join("receive.out");
    let out_file = std::fs::File::create(&out_path).expect("output file");
    let receiver = busprims(&bus)
        .arg("--format")
        .arg("json")
        .arg("receive")
        .stdout(out_file)
        .stderr(Stdio::null())
        .spawn()
        .expect("receive should start");
    thread::sleep(Duration::from_millis(300));

    let sent = busprims(&bus)
        .arg("--format")
        .arg("json")
        .arg("sendstr")
        .arg("abc")
        .output()
        .expect("sendstr should run");
    assert!(sent.status.success(), "sendstr failed: {sent:?}");
    assert_eq!(String::from_utf8_lossy(&sent.stdout).lines().count(), 5);

    let start = Instant::now();
    let mut received = String::new();
    while start.elapsed() < Duration::from_secs(3) {
        received = std::fs::read_to_string(&out_path).unwrap_or_default();
        if received.contains("abc_4") {
            break;
        }
        thread::sleep(Duration::from_millis(50));
    }

    stop(receiver);
    stop(daemon);
    let _ = std::fs::remove_dir_all(&dir);

    for index in 0..5 {
        assert!(received.contains(&format!("abc_{index}")), "received: {received}");
    }
    assert!(received.contains("\"member\":\"Test\""));
}

#[test]
fn query_without_daemon_fails() {
    let dir = unique_temp_dir("nodaemon");
    let output = busprims(&dir.join("missing.sock"))
        .arg("query")
        .arg("hello")
        .output()
        .expect("query should run");
    let _ = std::fs::remove_dir_all(&dir);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("connect failed"));
}

#[test]
fn usage_errors_exit_64() {
    let output = Command::new(env!("CARGO_BIN_EXE_busprims"))
        .arg("send")
        .arg("--interface")
        .arg("first")
        .output()
        .expect("send should run");
    assert_eq!(output.status.code(), Some(64));

    let output = Command::new(env!("CARGO_BIN_EXE_busprims"))
        .arg("--bus")
        .arg("/tmp/busprims-never-bound.sock")
        .arg("send")
        .arg("--interface")
        .arg("9")
        .output()
        .expect("send should run");
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn version_prints_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_busprims"))
        .arg("version")
        .output()
        .expect("version should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("busprims {}", env!("CARGO_PKG_VERSION")));
}
