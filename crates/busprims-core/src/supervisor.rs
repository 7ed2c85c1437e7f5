use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use busprims_bus::{Bus, Connection};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::channel::{BusChannel, ChannelConfig};
use crate::dispatcher::{DispatchConfig, DispatchStats, Dispatcher, SignalSink};
use crate::error::{CoreError, Result};

/// Longest single sleep while waiting on a token.
const CANCEL_CHECK_INTERVAL: Duration = Duration::from_millis(10);

/// Sleep for `duration` in short slices, returning early (with `true`) once
/// `cancel` fires.
pub(crate) fn sleep_unless_cancelled(cancel: &CancellationToken, duration: Duration) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if cancel.is_cancelled() {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        thread::sleep((deadline - now).min(CANCEL_CHECK_INTERVAL));
    }
}

/// How one listener thread ended.
#[derive(Debug)]
pub struct ListenerReport {
    pub interface: String,
    pub outcome: Result<DispatchStats>,
}

struct Listener {
    interface: String,
    handle: JoinHandle<Result<DispatchStats>>,
}

/// Runs one [`Dispatcher`] per channel, each on its own thread, sharing a
/// single cancellation token.
///
/// Dropping the supervisor cancels its listeners without waiting for them;
/// call [`ListenerSupervisor::shutdown`] to join.
pub struct ListenerSupervisor {
    cancel: CancellationToken,
    listeners: Vec<Listener>,
}

impl Default for ListenerSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl ListenerSupervisor {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            listeners: Vec::new(),
        }
    }

    /// Token that stops every listener when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Start `dispatcher` on a new thread.
    pub fn spawn<C>(&mut self, mut dispatcher: Dispatcher<C>) -> Result<()>
    where
        C: Connection + 'static,
    {
        let interface = dispatcher.channel().interface().to_string();
        let cancel = self.cancel.clone();
        let handle = thread::Builder::new()
            .name(format!("busprims-listen-{interface}"))
            .spawn(move || dispatcher.run(&cancel))
            .map_err(CoreError::Spawn)?;
        info!(%interface, "listener started");
        self.listeners.push(Listener { interface, handle });
        Ok(())
    }

    /// Open a channel on `bus`, subscribe it to its interface's signals and
    /// start a dispatcher for it.
    pub fn listen<B>(
        &mut self,
        bus: &B,
        channel: ChannelConfig,
        dispatch: DispatchConfig,
        sink: impl SignalSink + 'static,
    ) -> Result<()>
    where
        B: Bus,
    {
        let mut channel = BusChannel::open(bus, channel)?;
        channel.subscribe_signals()?;
        self.spawn(Dispatcher::new(channel, dispatch).with_sink(sink))
    }

    /// Block the calling thread until the token is cancelled, waking every
    /// `period` to report on listeners that stopped on their own.
    pub fn idle_until_cancelled(&self, period: Duration) {
        while !sleep_unless_cancelled(&self.cancel, period) {
            for listener in &self.listeners {
                if listener.handle.is_finished() {
                    warn!(interface = %listener.interface, "listener exited early");
                }
            }
        }
    }

    /// Cancel every listener and wait for each to finish.
    pub fn shutdown(mut self) -> Vec<ListenerReport> {
        self.cancel.cancel();
        std::mem::take(&mut self.listeners)
            .into_iter()
            .map(|listener| {
                let outcome = match listener.handle.join() {
                    Ok(outcome) => outcome,
                    Err(_) => Err(CoreError::ListenerPanicked(listener.interface.clone())),
                };
                match &outcome {
                    Ok(stats) => info!(interface = %listener.interface, ?stats, "listener joined"),
                    Err(err) => warn!(interface = %listener.interface, error = %err, "listener failed"),
                }
                ListenerReport {
                    interface: listener.interface,
                    outcome,
                }
            })
            .collect()
    }
}

impl Drop for ListenerSupervisor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
