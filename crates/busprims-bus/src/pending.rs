use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use busprims_message::Message;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{BusError, Result};
use crate::router::Deliver;

/// How often a blocked call looks at its cancellation token.
const CANCEL_CHECK_INTERVAL: Duration = Duration::from_millis(20);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Inbound side of one connection.
///
/// Replies to outstanding calls go straight to their [`PendingCall`];
/// everything else waits in the inbox for `pop`.
#[derive(Debug, Default)]
pub(crate) struct Mailbox {
    inbox: Mutex<VecDeque<Message>>,
    pending: Mutex<HashMap<u32, mpsc::Sender<Message>>>,
    closed: AtomicBool,
}

impl Mailbox {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn deliver(&self, msg: Message) -> Result<()> {
        if self.is_closed() {
            return Err(BusError::Disconnected("connection closed".to_string()));
        }
        if let Some(reply_serial) = msg.reply_serial() {
            if let Some(waiter) = lock(&self.pending).remove(&reply_serial) {
                // A waiter that already gave up leaves the reply to the inbox.
                match waiter.send(msg) {
                    Ok(()) => return Ok(()),
                    Err(mpsc::SendError(msg)) => {
                        lock(&self.inbox).push_back(msg);
                        return Ok(());
                    }
                }
            }
        }
        lock(&self.inbox).push_back(msg);
        Ok(())
    }

    /// Next inbound message; `Disconnected` once closed and drained.
    pub(crate) fn pop(&self) -> Result<Option<Message>> {
        if let Some(msg) = lock(&self.inbox).pop_front() {
            return Ok(Some(msg));
        }
        if self.is_closed() {
            return Err(BusError::Disconnected("connection closed".to_string()));
        }
        Ok(None)
    }

    pub(crate) fn register(self: &Arc<Self>, serial: u32, timeout: Duration) -> PendingCall {
        let (tx, rx) = mpsc::channel();
        lock(&self.pending).insert(serial, tx);
        PendingCall {
            serial,
            timeout,
            deadline: Instant::now() + timeout,
            rx,
            reply: None,
            completed: false,
            mailbox: Arc::clone(self),
        }
    }

    fn forget(&self, serial: u32) {
        lock(&self.pending).remove(&serial);
    }

    /// Stop accepting messages and wake every waiting call.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        lock(&self.pending).clear();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Deliver for Mailbox {
    fn deliver(&self, msg: Message) -> Result<()> {
        Mailbox::deliver(self, msg)
    }
}

/// Handle on the reply to one method call.
///
/// Blocking ends when the reply arrives, the timeout elapses or the
/// connection closes. Dropping the handle deregisters it; a reply that arrives
/// afterwards is queued as an ordinary inbound message.
#[derive(Debug)]
pub struct PendingCall {
    serial: u32,
    timeout: Duration,
    deadline: Instant,
    rx: mpsc::Receiver<Message>,
    reply: Option<Message>,
    completed: bool,
    mailbox: Arc<Mailbox>,
}

impl PendingCall {
    /// Serial of the call this handle waits on.
    pub fn serial(&self) -> u32 {
        self.serial
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// True once a reply arrived or waiting is over.
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Block until the reply arrives or the timeout elapses.
    pub fn block(&mut self) {
        self.wait(None);
    }

    /// Like [`PendingCall::block`] but gives up when `cancel` fires.
    ///
    /// Returns true if the wait was cancelled before completing.
    pub fn block_or_cancel(&mut self, cancel: &CancellationToken) -> bool {
        self.wait(Some(cancel))
    }

    /// Take the reply, if one arrived. Later calls return `None`.
    pub fn steal_reply(&mut self) -> Option<Message> {
        self.reply.take()
    }

    fn wait(&mut self, cancel: Option<&CancellationToken>) -> bool {
        while !self.completed {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return true;
            }
            let now = Instant::now();
            if now >= self.deadline {
                debug!(serial = self.serial, timeout = ?self.timeout, "call timed out");
                self.complete();
                // Accept a reply that raced the deadline.
                if let Ok(msg) = self.rx.try_recv() {
                    self.reply = Some(msg);
                }
                break;
            }
            let slice = (self.deadline - now).min(CANCEL_CHECK_INTERVAL);
            match self.rx.recv_timeout(slice) {
                Ok(msg) => {
                    self.reply = Some(msg);
                    self.complete();
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    debug!(serial = self.serial, "connection closed while waiting for reply");
                    self.complete();
                }
            }
        }
        false
    }

    fn complete(&mut self) {
        self.completed = true;
        self.mailbox.forget(self.serial);
    }
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        if !self.completed {
            self.mailbox.forget(self.serial);
        }
    }
}
