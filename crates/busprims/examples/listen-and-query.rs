//! Listen-and-query example: one process, one in-memory bus, both sides.
//!
//! A signal listener and a method server run on their own threads; the main
//! thread broadcasts a catalog signal and then makes a blocking call.
//!
//! Run with:
//!   cargo run --example listen-and-query

use std::sync::mpsc;
use std::time::Duration;

use busprims::bus::MemoryBus;
use busprims::core::{send, BusChannel, BusConfig, ListenerSupervisor, MessageSpec, ReceivedSignal};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let bus = MemoryBus::new();
    let config = BusConfig {
        reply_delay_ms: 100,
        ..BusConfig::default()
    };
    let signals = config.interface(0)?;
    let methods = config.interface(1)?;

    let mut supervisor = ListenerSupervisor::new();
    let (tx, rx) = mpsc::channel::<ReceivedSignal>();
    supervisor.listen(
        &bus,
        signals.receiver_channel(),
        signals.dispatch_config(&config),
        tx,
    )?;
    supervisor.listen(
        &bus,
        methods.receiver_channel(),
        methods.dispatch_config(&config),
        |_signal: ReceivedSignal| {},
    )?;

    let mut source = BusChannel::open(&bus, signals.sender_channel())?;
    if let Some(spec) = signals.message(0) {
        send(&mut source, spec)?;
    }
    let signal = rx.recv_timeout(Duration::from_secs(2))?;
    for field in &signal.fields {
        let value = field
            .value
            .as_ref()
            .map_or_else(|| "<unknown>".to_string(), ToString::to_string);
        eprintln!("[listener] {} #{} {} = {value}", signal.member, field.position, field.kind);
    }

    let mut caller = BusChannel::open(&bus, methods.sender_channel())?;
    let reply = send(&mut caller, &MessageSpec::new("msg000A").with("ping"))?;
    eprintln!("[caller] reply: {}", reply.unwrap_or_default());

    for report in supervisor.shutdown() {
        match report.outcome {
            Ok(stats) => eprintln!("[supervisor] {} {stats:?}", report.interface),
            Err(err) => eprintln!("[supervisor] {} failed: {err}", report.interface),
        }
    }
    Ok(())
}
