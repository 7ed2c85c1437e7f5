use busprims_message::Value;
use serde::{Deserialize, Serialize};

/// Named, ordered list of arguments describing one logical message.
///
/// Receivers decode positionally, so field order is part of the contract.
///
/// ```
/// use busprims_core::MessageSpec;
/// use busprims_message::Value;
///
/// let spec = MessageSpec::new("msg000").with("asdf").with(234).with("TEST!!!");
/// assert_eq!(spec.fields[1], Value::Int32(234));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSpec {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<Value>,
}

impl MessageSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field.
    pub fn with(mut self, value: impl Into<Value>) -> Self {
        self.fields.push(value.into());
        self
    }

    pub fn push(&mut self, value: impl Into<Value>) {
        self.fields.push(value.into());
    }
}
