use std::time::Duration;

use busprims_bus::{Bus, Connection, MatchRule, NameReply};
use busprims_message::names::{validate_bus_name, validate_interface, validate_path};
use busprims_message::Message;
use tracing::{info, warn};

use crate::builder::build_message;
use crate::error::Result;
use crate::spec::MessageSpec;

/// Reply timeout used by unicast channels configured without one.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_millis(1500);

/// Addressing for one [`BusChannel`].
///
/// A `target_name` makes the channel unicast: messages become method calls to
/// that name and senders wait for a reply. Without it the channel broadcasts
/// signals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    pub object_path: String,
    pub interface: String,
    pub local_name: String,
    pub target_name: Option<String>,
    pub reply_timeout: Option<Duration>,
}

impl ChannelConfig {
    pub fn broadcast(
        object_path: impl Into<String>,
        interface: impl Into<String>,
        local_name: impl Into<String>,
    ) -> Self {
        Self {
            object_path: object_path.into(),
            interface: interface.into(),
            local_name: local_name.into(),
            target_name: None,
            reply_timeout: None,
        }
    }

    pub fn unicast(
        object_path: impl Into<String>,
        interface: impl Into<String>,
        local_name: impl Into<String>,
        target_name: impl Into<String>,
        reply_timeout: Duration,
    ) -> Self {
        Self {
            object_path: object_path.into(),
            interface: interface.into(),
            local_name: local_name.into(),
            target_name: Some(target_name.into()),
            reply_timeout: Some(reply_timeout),
        }
    }

    fn validate(&self) -> Result<()> {
        validate_path(&self.object_path)?;
        validate_interface(&self.interface)?;
        validate_bus_name(&self.local_name)?;
        if let Some(target) = &self.target_name {
            validate_bus_name(target)?;
        }
        Ok(())
    }
}

/// One interface bound to one local name over its own connection.
///
/// Owned by a single thread; channels never share a connection.
pub struct BusChannel<C: Connection> {
    conn: C,
    config: ChannelConfig,
    name_reply: NameReply,
}

impl<C: Connection> BusChannel<C> {
    /// Connect to `bus` and request the channel's local name.
    ///
    /// Losing the name to another connection is logged and tolerated; the
    /// channel can still send.
    pub fn open<B>(bus: &B, config: ChannelConfig) -> Result<Self>
    where
        B: Bus<Conn = C>,
    {
        config.validate()?;
        let mut conn = bus.connect()?;
        let name_reply = conn.request_name(&config.local_name)?;
        if name_reply.is_owner() {
            info!(
                name = %config.local_name,
                interface = %config.interface,
                unique_name = conn.unique_name(),
                "channel opened"
            );
        } else {
            warn!(
                name = %config.local_name,
                interface = %config.interface,
                unique_name = conn.unique_name(),
                "not primary owner of bus name, continuing"
            );
        }
        Ok(Self {
            conn,
            config,
            name_reply,
        })
    }

    /// Ask the bus for every signal on this channel's interface.
    pub fn subscribe_signals(&mut self) -> Result<()> {
        let rule = MatchRule::signals(self.config.interface.clone());
        self.conn.add_match(&rule)?;
        info!(interface = %self.config.interface, %rule, "subscribed to signals");
        Ok(())
    }

    pub fn is_unicast(&self) -> bool {
        self.config.target_name.is_some()
    }

    /// Build a message for `path` from `spec` without sending it.
    pub fn build(&self, path: &str, spec: &MessageSpec) -> Result<Message> {
        build_message(&self.config, path, spec)
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn object_path(&self) -> &str {
        &self.config.object_path
    }

    pub fn interface(&self) -> &str {
        &self.config.interface
    }

    pub fn local_name(&self) -> &str {
        &self.config.local_name
    }

    pub fn target_name(&self) -> Option<&str> {
        self.config.target_name.as_deref()
    }

    pub fn reply_timeout(&self) -> Duration {
        self.config.reply_timeout.unwrap_or(DEFAULT_REPLY_TIMEOUT)
    }

    /// Answer the bus gave when the local name was requested.
    pub fn name_reply(&self) -> NameReply {
        self.name_reply
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.conn
    }
}
