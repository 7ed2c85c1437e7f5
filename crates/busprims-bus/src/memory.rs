use std::sync::Arc;
use std::time::Duration;

use busprims_message::Message;
use tracing::debug;

use crate::connection::{Bus, Connection, NameReply, Serials};
use crate::error::{BusError, Result};
use crate::match_rule::MatchRule;
use crate::pending::{Mailbox, PendingCall};
use crate::router::Router;

/// A bus whose connections all live in this process.
///
/// Clones share the same routing table, so a clone handed to another thread
/// reaches the same set of names.
#[derive(Clone, Default)]
pub struct MemoryBus {
    router: Arc<Router>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
        }
    }

    /// Unique name of the connection owning `name`, if any.
    pub fn name_owner(&self, name: &str) -> Option<String> {
        self.router.owner_of(name)
    }
}

impl Bus for MemoryBus {
    type Conn = MemoryConnection;

    fn connect(&self) -> Result<MemoryConnection> {
        let mailbox = Mailbox::new();
        let unique = self.router.register(mailbox.clone());
        Ok(MemoryConnection {
            unique,
            router: Arc::clone(&self.router),
            mailbox,
            serials: Serials::default(),
        })
    }
}

/// Connection to a [`MemoryBus`]. Dropping it releases its names.
pub struct MemoryConnection {
    unique: String,
    router: Arc<Router>,
    mailbox: Arc<Mailbox>,
    serials: Serials,
}

impl MemoryConnection {
    fn stamp(&mut self, msg: &mut Message) -> u32 {
        let serial = self.serials.next();
        msg.set_serial(serial);
        serial
    }
}

impl Connection for MemoryConnection {
    fn unique_name(&self) -> &str {
        &self.unique
    }

    fn request_name(&mut self, name: &str) -> Result<NameReply> {
        self.router.request_name(&self.unique, name)
    }

    fn add_match(&mut self, rule: &MatchRule) -> Result<()> {
        self.router.add_match(&self.unique, rule.clone())
    }

    fn send(&mut self, mut msg: Message) -> Result<u32> {
        if self.mailbox.is_closed() {
            return Err(BusError::Disconnected(self.unique.clone()));
        }
        let serial = self.stamp(&mut msg);
        self.router.route(&self.unique, msg);
        Ok(serial)
    }

    fn send_with_reply(&mut self, mut msg: Message, timeout: Duration) -> Result<PendingCall> {
        if self.mailbox.is_closed() {
            return Err(BusError::Disconnected(self.unique.clone()));
        }
        let serial = self.stamp(&mut msg);
        // Registered first so a fast reply cannot slip past.
        let pending = self.mailbox.register(serial, timeout);
        self.router.route(&self.unique, msg);
        Ok(pending)
    }

    fn pop_message(&mut self) -> Result<Option<Message>> {
        self.mailbox.pop()
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        debug!(unique_name = %self.unique, "closing in-process connection");
        self.router.disconnect(&self.unique);
        self.mailbox.close();
    }
}
