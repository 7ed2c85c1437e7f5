//! Per-channel poll loop.
//!
//! A [`Dispatcher`] owns one [`BusChannel`] and handles its inbound traffic
//! strictly in arrival order: known signals are decoded and handed to a
//! [`SignalSink`], known method calls are answered after the configured
//! delay, everything else is dropped.

use std::sync::mpsc;
use std::time::Duration;

use busprims_bus::Connection;
use busprims_message::{Message, MessageKind};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::channel::BusChannel;
use crate::decoder::{decode, DecodedField};
use crate::error::Result;
use crate::reply::{handle_call, DEFAULT_REPLY_PREFIX};
use crate::supervisor::sleep_unless_cancelled;

/// Sleep between polls that found nothing.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);
/// Pause before answering a call, standing in for real work.
pub const DEFAULT_REPLY_DELAY: Duration = Duration::from_millis(1000);

/// What a dispatcher reacts to and how it paces itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Signal members decoded and passed to the sink.
    pub signal_members: Vec<String>,
    /// Method members answered through the reply handler.
    pub call_members: Vec<String>,
    pub poll_interval: Duration,
    pub reply_delay: Duration,
    pub reply_prefix: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            signal_members: Vec::new(),
            call_members: Vec::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            reply_delay: DEFAULT_REPLY_DELAY,
            reply_prefix: DEFAULT_REPLY_PREFIX.to_string(),
        }
    }
}

impl DispatchConfig {
    pub fn with_signals<I, S>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.signal_members.extend(members.into_iter().map(Into::into));
        self
    }

    pub fn with_calls<I, S>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.call_members.extend(members.into_iter().map(Into::into));
        self
    }

    pub fn with_reply_delay(mut self, delay: Duration) -> Self {
        self.reply_delay = delay;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// A decoded signal, as handed to a [`SignalSink`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceivedSignal {
    pub interface: String,
    pub member: String,
    pub path: Option<String>,
    pub sender: Option<String>,
    pub serial: u32,
    pub fields: Vec<DecodedField>,
}

impl ReceivedSignal {
    fn from_message(msg: &Message) -> Self {
        Self {
            interface: msg.interface().unwrap_or_default().to_string(),
            member: msg.member().unwrap_or_default().to_string(),
            path: msg.path().map(str::to_string),
            sender: msg.sender().map(str::to_string),
            serial: msg.serial(),
            fields: decode(msg).collect(),
        }
    }
}

/// Receives every signal a dispatcher recognizes.
pub trait SignalSink: Send {
    fn on_signal(&mut self, signal: ReceivedSignal);
}

impl<F> SignalSink for F
where
    F: FnMut(ReceivedSignal) + Send,
{
    fn on_signal(&mut self, signal: ReceivedSignal) {
        self(signal)
    }
}

impl SignalSink for mpsc::Sender<ReceivedSignal> {
    fn on_signal(&mut self, signal: ReceivedSignal) {
        if self.send(signal).is_err() {
            debug!("signal receiver dropped");
        }
    }
}

/// Default sink: log each signal's fields.
struct LogSink;

impl SignalSink for LogSink {
    fn on_signal(&mut self, signal: ReceivedSignal) {
        if signal.fields.is_empty() {
            info!(interface = %signal.interface, member = %signal.member, "signal without parameters");
        }
        for field in &signal.fields {
            match &field.value {
                Some(value) => info!(
                    interface = %signal.interface,
                    member = %signal.member,
                    position = field.position,
                    kind = %field.kind,
                    %value,
                    "signal field"
                ),
                None => info!(
                    interface = %signal.interface,
                    member = %signal.member,
                    position = field.position,
                    kind = %field.kind,
                    "signal field of unknown type"
                ),
            }
        }
    }
}

/// Outcome of one [`Dispatcher::poll_once`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Nothing was waiting.
    Idle,
    Signal,
    Call,
    /// A message arrived that this channel does not handle.
    Ignored,
}

/// Counters accumulated over a dispatcher's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub signals: u64,
    pub calls: u64,
    pub ignored: u64,
}

pub struct Dispatcher<C: Connection> {
    channel: BusChannel<C>,
    config: DispatchConfig,
    sink: Box<dyn SignalSink>,
    cancel: CancellationToken,
    stats: DispatchStats,
}

impl<C: Connection> Dispatcher<C> {
    /// Signals go to a sink that logs them until [`Dispatcher::with_sink`]
    /// replaces it.
    pub fn new(channel: BusChannel<C>, config: DispatchConfig) -> Self {
        Self {
            channel,
            config,
            sink: Box::new(LogSink),
            cancel: CancellationToken::new(),
            stats: DispatchStats::default(),
        }
    }

    pub fn with_sink(mut self, sink: impl SignalSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn channel(&self) -> &BusChannel<C> {
        &self.channel
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Take at most one message off the connection and handle it.
    ///
    /// Never sleeps when nothing is waiting; a known call blocks for the
    /// reply delay before it is answered.
    pub fn poll_once(&mut self) -> Result<Step> {
        let Some(msg) = self.channel.connection_mut().pop_message()? else {
            return Ok(Step::Idle);
        };

        let interface = self.channel.interface();
        let step = match msg.kind() {
            MessageKind::Signal
                if self.config.signal_members.iter().any(|m| msg.is_signal(interface, m)) =>
            {
                Step::Signal
            }
            MessageKind::MethodCall
                if self.config.call_members.iter().any(|m| msg.is_method_call(interface, m)) =>
            {
                Step::Call
            }
            _ => Step::Ignored,
        };

        match step {
            Step::Signal => {
                self.stats.signals += 1;
                let signal = ReceivedSignal::from_message(&msg);
                debug!(interface = %signal.interface, member = %signal.member, serial = signal.serial, "signal received");
                self.sink.on_signal(signal);
            }
            Step::Call => {
                self.stats.calls += 1;
                debug!(interface, member = msg.member(), serial = msg.serial(), "call received");
                if sleep_unless_cancelled(&self.cancel, self.config.reply_delay) {
                    debug!(serial = msg.serial(), "cancelled before replying");
                } else {
                    handle_call(msg, &mut self.channel, &self.config.reply_prefix)?;
                }
            }
            Step::Ignored => {
                self.stats.ignored += 1;
                debug!(
                    interface = msg.interface(),
                    member = msg.member(),
                    kind = %msg.kind(),
                    "ignoring message"
                );
            }
            Step::Idle => {}
        }
        Ok(step)
    }

    /// Poll until `cancel` fires, sleeping `poll_interval` whenever the
    /// connection is empty. Returns the counters at exit.
    pub fn run(&mut self, cancel: &CancellationToken) -> Result<DispatchStats> {
        self.cancel = cancel.clone();
        info!(interface = self.channel.interface(), name = self.channel.local_name(), "dispatcher started");
        while !cancel.is_cancelled() {
            if self.poll_once()? == Step::Idle {
                sleep_unless_cancelled(cancel, self.config.poll_interval);
            }
        }
        info!(
            interface = self.channel.interface(),
            signals = self.stats.signals,
            calls = self.stats.calls,
            ignored = self.stats.ignored,
            "dispatcher stopped"
        );
        Ok(self.stats)
    }
}

#[cfg(test)]
mod tests {
    use busprims_bus::{Bus, MemoryBus, MemoryConnection};
    use busprims_message::Value;

    use super::*;
    use crate::channel::ChannelConfig;

    fn listener(bus: &MemoryBus, config: DispatchConfig) -> (Dispatcher<MemoryConnection>, mpsc::Receiver<ReceivedSignal>) {
        let mut channel = BusChannel::open(
            bus,
            ChannelConfig::broadcast("/test/signal/Object", "test.signal.Type", "test.signal.sink"),
        )
        .unwrap();
        channel.subscribe_signals().unwrap();
        let (tx, rx) = mpsc::channel();
        (Dispatcher::new(channel, config).with_sink(tx), rx)
    }

    #[test]
    fn idle_when_nothing_waits() {
        let bus = MemoryBus::new();
        let (mut dispatcher, _rx) = listener(&bus, DispatchConfig::default().with_signals(["Test"]));
        assert_eq!(dispatcher.poll_once().unwrap(), Step::Idle);
    }

    #[test]
    fn known_signal_reaches_sink() {
        let bus = MemoryBus::new();
        let (mut dispatcher, rx) = listener(&bus, DispatchConfig::default().with_signals(["Test", "Num"]));

        let mut sender = bus.connect().unwrap();
        let mut signal = Message::new_signal("/test/signal/Object", "test.signal.Type", "Num").unwrap();
        signal.append(&Value::Int32(42)).unwrap();
        sender.send(signal).unwrap();

        assert_eq!(dispatcher.poll_once().unwrap(), Step::Signal);
        let received = rx.try_recv().unwrap();
        assert_eq!(received.member, "Num");
        assert_eq!(received.sender.as_deref(), Some(sender.unique_name()));
        assert_eq!(received.fields[0].value, Some(Value::Int32(42)));
        assert_eq!(dispatcher.stats().signals, 1);
    }

    #[test]
    fn unknown_member_is_ignored() {
        let bus = MemoryBus::new();
        let (mut dispatcher, rx) = listener(&bus, DispatchConfig::default().with_signals(["Test"]));

        let mut sender = bus.connect().unwrap();
        sender
            .send(Message::new_signal("/test/signal/Object", "test.signal.Type", "Other").unwrap())
            .unwrap();

        assert_eq!(dispatcher.poll_once().unwrap(), Step::Ignored);
        assert!(rx.try_recv().is_err());
        assert_eq!(dispatcher.stats().ignored, 1);
    }

    #[test]
    fn closure_sinks_work() {
        let bus = MemoryBus::new();
        let mut channel = BusChannel::open(
            &bus,
            ChannelConfig::broadcast("/test/signal/Object", "test.signal.Type", "test.signal.sink"),
        )
        .unwrap();
        channel.subscribe_signals().unwrap();

        let (tx, rx) = mpsc::channel();
        let mut dispatcher = Dispatcher::new(channel, DispatchConfig::default().with_signals(["Tick"]))
            .with_sink(move |signal: ReceivedSignal| {
                let _ = tx.send(signal.member);
            });

        let mut sender = bus.connect().unwrap();
        sender
            .send(Message::new_signal("/test/signal/Object", "test.signal.Type", "Tick").unwrap())
            .unwrap();
        assert_eq!(dispatcher.poll_once().unwrap(), Step::Signal);
        assert_eq!(rx.try_recv().unwrap(), "Tick");
    }

    #[test]
    fn run_stops_on_cancel() {
        let bus = MemoryBus::new();
        let (mut dispatcher, _rx) = listener(&bus, DispatchConfig::default().with_signals(["Test"]));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let stats = dispatcher.run(&cancel).unwrap();
        assert_eq!(stats, DispatchStats::default());
    }
}
