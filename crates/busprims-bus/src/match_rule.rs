use std::fmt;
use std::str::FromStr;

use busprims_message::{Message, MessageKind};

use crate::error::{BusError, Result};

/// Selects inbound messages a connection wants delivered.
///
/// Written as `type='signal',interface='test.signal.Type'`; every key present
/// must match, absent keys match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchRule {
    pub kind: Option<MessageKind>,
    pub interface: Option<String>,
    pub member: Option<String>,
    pub path: Option<String>,
    pub sender: Option<String>,
}

impl MatchRule {
    /// All signals on `interface`.
    pub fn signals(interface: impl Into<String>) -> Self {
        Self {
            kind: Some(MessageKind::Signal),
            interface: Some(interface.into()),
            ..Self::default()
        }
    }

    pub fn with_member(mut self, member: impl Into<String>) -> Self {
        self.member = Some(member.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn matches(&self, msg: &Message) -> bool {
        fn field_ok(expected: &Option<String>, actual: Option<&str>) -> bool {
            expected.as_deref().is_none_or(|want| actual == Some(want))
        }

        self.kind.is_none_or(|kind| msg.kind() == kind)
            && field_ok(&self.interface, msg.interface())
            && field_ok(&self.member, msg.member())
            && field_ok(&self.path, msg.path())
            && field_ok(&self.sender, msg.sender())
    }

    pub fn parse(text: &str) -> Result<Self> {
        let invalid = |reason: &str| BusError::InvalidMatchRule {
            rule: text.to_string(),
            reason: reason.to_string(),
        };

        let mut rule = MatchRule::default();
        for part in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, raw) = part
                .split_once('=')
                .ok_or_else(|| invalid("expected key='value'"))?;
            let value = raw
                .trim()
                .strip_prefix('\'')
                .and_then(|v| v.strip_suffix('\''))
                .ok_or_else(|| invalid("values must be single-quoted"))?
                .to_string();

            match key.trim() {
                "type" => {
                    rule.kind = Some(match value.as_str() {
                        "signal" => MessageKind::Signal,
                        "method_call" => MessageKind::MethodCall,
                        "method_return" => MessageKind::MethodReturn,
                        "error" => MessageKind::Error,
                        _ => return Err(invalid("unknown message type")),
                    })
                }
                "interface" => rule.interface = Some(value),
                "member" => rule.member = Some(value),
                "path" => rule.path = Some(value),
                "sender" => rule.sender = Some(value),
                _ => return Err(invalid("unknown key")),
            }
        }
        Ok(rule)
    }
}

impl FromStr for MatchRule {
    type Err = BusError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(kind) = self.kind {
            parts.push(format!("type='{kind}'"));
        }
        for (key, value) in [
            ("interface", &self.interface),
            ("member", &self.member),
            ("path", &self.path),
            ("sender", &self.sender),
        ] {
            if let Some(value) = value {
                parts.push(format!("{key}='{value}'"));
            }
        }
        f.write_str(&parts.join(","))
    }
}
