//! Interface tables and pacing, loadable from JSON.
//!
//! [`BusConfig::default`] carries the two reference interfaces: broadcast
//! signals on `test.signal.Type` and request/reply calls on
//! `test.method.Type`.

use std::path::Path;
use std::time::Duration;

use busprims_message::Value;
use serde::{Deserialize, Serialize};

use crate::channel::ChannelConfig;
use crate::dispatcher::{DispatchConfig, DEFAULT_POLL_INTERVAL, DEFAULT_REPLY_DELAY};
use crate::error::{CoreError, Result};
use crate::reply::DEFAULT_REPLY_PREFIX;
use crate::spec::MessageSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceKind {
    /// Broadcast signals, no replies.
    Signal,
    /// Method calls answered by the receiver.
    Method,
}

/// One interface: its addressing, known members and message catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceConfig {
    pub name: String,
    pub object_path: String,
    pub kind: InterfaceKind,
    /// Name the sending side registers.
    pub sender_name: String,
    /// Name the receiving side registers; calls are addressed to it.
    pub receiver_name: String,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_timeout_ms: Option<u64>,
    /// Messages addressable by index from the command line.
    #[serde(default)]
    pub messages: Vec<MessageSpec>,
}

impl InterfaceConfig {
    pub fn reply_timeout(&self) -> Option<Duration> {
        self.reply_timeout_ms.map(Duration::from_millis)
    }

    /// Channel for the sending side. Method interfaces target the receiver.
    pub fn sender_channel(&self) -> ChannelConfig {
        ChannelConfig {
            object_path: self.object_path.clone(),
            interface: self.name.clone(),
            local_name: self.sender_name.clone(),
            target_name: match self.kind {
                InterfaceKind::Signal => None,
                InterfaceKind::Method => Some(self.receiver_name.clone()),
            },
            reply_timeout: self.reply_timeout(),
        }
    }

    /// Channel for the receiving side; it never targets anyone.
    pub fn receiver_channel(&self) -> ChannelConfig {
        ChannelConfig::broadcast(&self.object_path, &self.name, &self.receiver_name)
    }

    pub fn message(&self, index: usize) -> Option<&MessageSpec> {
        self.messages.get(index)
    }

    /// Dispatch settings for a receiver of this interface.
    pub fn dispatch_config(&self, bus: &BusConfig) -> DispatchConfig {
        let base = DispatchConfig {
            poll_interval: bus.poll_interval(),
            reply_delay: bus.reply_delay(),
            reply_prefix: bus.reply_prefix.clone(),
            ..DispatchConfig::default()
        };
        match self.kind {
            InterfaceKind::Signal => base.with_signals(self.members.iter().cloned()),
            InterfaceKind::Method => base.with_calls(self.members.iter().cloned()),
        }
    }
}

/// Everything a sender or listener needs besides the bus address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub interfaces: Vec<InterfaceConfig>,
    pub poll_interval_ms: u64,
    pub reply_delay_ms: u64,
    pub reply_prefix: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        let signals = InterfaceConfig {
            name: "test.signal.Type".to_string(),
            object_path: "/test/signal/Object".to_string(),
            kind: InterfaceKind::Signal,
            sender_name: "test.signal.source".to_string(),
            receiver_name: "test.signal.sink".to_string(),
            members: ["msg000", "msg001", "msg002", "Test", "Tick", "Num"]
                .map(String::from)
                .to_vec(),
            reply_timeout_ms: None,
            messages: vec![
                MessageSpec::new("msg000")
                    .with("asdf")
                    .with(234)
                    .with("TEST!!!"),
                MessageSpec::new("msg001")
                    .with(Value::Byte(7))
                    .with(Value::Int16(-12))
                    .with("msg001"),
                MessageSpec::new("msg002").with("msg002").with(Value::Int32(2)),
            ],
        };
        let methods = InterfaceConfig {
            name: "test.method.Type".to_string(),
            object_path: "/test/method/Object".to_string(),
            kind: InterfaceKind::Method,
            sender_name: "test.method.caller".to_string(),
            receiver_name: "test.method.server".to_string(),
            members: vec!["msg000A".to_string()],
            reply_timeout_ms: Some(1500),
            messages: vec![MessageSpec::new("msg000A").with("TEST - received msg0007")],
        };
        Self {
            interfaces: vec![signals, methods],
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            reply_delay_ms: DEFAULT_REPLY_DELAY.as_millis() as u64,
            reply_prefix: DEFAULT_REPLY_PREFIX.to_string(),
        }
    }
}

impl BusConfig {
    /// Read and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| CoreError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.interfaces.is_empty() {
            return Err(CoreError::Config("no interfaces configured".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(CoreError::Config("poll_interval_ms must be positive".to_string()));
        }
        for iface in &self.interfaces {
            if iface.kind == InterfaceKind::Method && iface.reply_timeout_ms.is_none() {
                return Err(CoreError::Config(format!(
                    "method interface {} needs reply_timeout_ms",
                    iface.name
                )));
            }
            if let Some(spec) = iface.messages.iter().find(|m| !iface.members.contains(&m.name)) {
                return Err(CoreError::Config(format!(
                    "message {} is not a member of {}",
                    spec.name, iface.name
                )));
            }
        }
        Ok(())
    }

    pub fn interface(&self, index: usize) -> Result<&InterfaceConfig> {
        self.interfaces.get(index).ok_or_else(|| {
            CoreError::Config(format!(
                "interface index {index} out of range (have {})",
                self.interfaces.len()
            ))
        })
    }

    /// First interface of the given kind.
    pub fn first_of(&self, kind: InterfaceKind) -> Result<&InterfaceConfig> {
        self.interfaces
            .iter()
            .find(|iface| iface.kind == kind)
            .ok_or_else(|| CoreError::Config(format!("no {kind:?} interface configured")))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn reply_delay(&self) -> Duration {
        Duration::from_millis(self.reply_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = BusConfig::default();
        config.validate().unwrap();
        assert_eq!(config.interfaces.len(), 2);
        assert_eq!(config.poll_interval(), Duration::from_millis(10));
        assert_eq!(config.reply_delay(), Duration::from_millis(1000));
        assert_eq!(config.reply_prefix, "RPLY_MSG");
    }

    #[test]
    fn default_channels() {
        let config = BusConfig::default();
        let signals = config.interface(0).unwrap();
        let sender = signals.sender_channel();
        assert_eq!(sender.local_name, "test.signal.source");
        assert_eq!(sender.target_name, None);

        let methods = config.interface(1).unwrap();
        let caller = methods.sender_channel();
        assert_eq!(caller.target_name.as_deref(), Some("test.method.server"));
        assert_eq!(caller.reply_timeout, Some(Duration::from_millis(1500)));

        let server = methods.receiver_channel();
        assert_eq!(server.local_name, "test.method.server");
        assert_eq!(server.target_name, None);
    }

    #[test]
    fn dispatch_config_follows_kind() {
        let config = BusConfig::default();
        let signal = config.interface(0).unwrap().dispatch_config(&config);
        assert!(signal.signal_members.contains(&"Tick".to_string()));
        assert!(signal.call_members.is_empty());

        let method = config.interface(1).unwrap().dispatch_config(&config);
        assert_eq!(method.call_members, vec!["msg000A".to_string()]);
        assert_eq!(method.reply_prefix, "RPLY_MSG");
    }

    #[test]
    fn catalog_message_lookup() {
        let config = BusConfig::default();
        let spec = config.interface(0).unwrap().message(0).unwrap();
        assert_eq!(spec.name, "msg000");
        assert_eq!(spec.fields.len(), 3);
        assert!(config.interface(0).unwrap().message(9).is_none());
        assert!(config.interface(5).is_err());
    }

    #[test]
    fn json_round_trip_keeps_defaults() {
        let text = serde_json::to_string(&BusConfig::default()).unwrap();
        assert_eq!(BusConfig::from_json(&text).unwrap(), BusConfig::default());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config = BusConfig::from_json(r#"{"reply_delay_ms": 5}"#).unwrap();
        assert_eq!(config.reply_delay(), Duration::from_millis(5));
        assert_eq!(config.interfaces.len(), 2);
    }

    #[test]
    fn validation_errors() {
        let mut config = BusConfig::default();
        config.interfaces[1].reply_timeout_ms = None;
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));

        let mut config = BusConfig::default();
        config.interfaces[0].messages.push(MessageSpec::new("NotAMember"));
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));

        let config = BusConfig {
            interfaces: Vec::new(),
            ..BusConfig::default()
        };
        assert!(config.validate().is_err());

        let config = BusConfig {
            poll_interval_ms: 0,
            ..BusConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = BusConfig::load("/nonexistent/busprims.json").unwrap_err();
        assert!(matches!(err, CoreError::ConfigRead { .. }));
    }
}
