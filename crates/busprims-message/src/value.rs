use std::fmt;

use serde::{Deserialize, Serialize};

/// Wire type of one argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Byte,
    Boolean,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Double,
    String,
}

impl TypeTag {
    pub const ALL: [TypeTag; 10] = [
        TypeTag::Byte,
        TypeTag::Boolean,
        TypeTag::Int16,
        TypeTag::UInt16,
        TypeTag::Int32,
        TypeTag::UInt32,
        TypeTag::Int64,
        TypeTag::UInt64,
        TypeTag::Double,
        TypeTag::String,
    ];

    /// One-byte code written in front of each argument.
    pub fn code(self) -> u8 {
        match self {
            TypeTag::Byte => b'y',
            TypeTag::Boolean => b'b',
            TypeTag::Int16 => b'n',
            TypeTag::UInt16 => b'q',
            TypeTag::Int32 => b'i',
            TypeTag::UInt32 => b'u',
            TypeTag::Int64 => b'x',
            TypeTag::UInt64 => b't',
            TypeTag::Double => b'd',
            TypeTag::String => b's',
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|tag| tag.code() == code)
    }

    /// Payload width for fixed-size types, `None` for strings.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            TypeTag::Byte | TypeTag::Boolean => Some(1),
            TypeTag::Int16 | TypeTag::UInt16 => Some(2),
            TypeTag::Int32 | TypeTag::UInt32 => Some(4),
            TypeTag::Int64 | TypeTag::UInt64 | TypeTag::Double => Some(8),
            TypeTag::String => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TypeTag::Byte => "byte",
            TypeTag::Boolean => "boolean",
            TypeTag::Int16 => "int16",
            TypeTag::UInt16 => "uint16",
            TypeTag::Int32 => "int32",
            TypeTag::UInt32 => "uint32",
            TypeTag::Int64 => "int64",
            TypeTag::UInt64 => "uint64",
            TypeTag::Double => "double",
            TypeTag::String => "string",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One typed message argument.
///
/// In configuration files a value is written as
/// `{"type": "int32", "value": 234}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    Byte(u8),
    Boolean(bool),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Double(f64),
    String(String),
}

impl Value {
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::Byte(_) => TypeTag::Byte,
            Value::Boolean(_) => TypeTag::Boolean,
            Value::Int16(_) => TypeTag::Int16,
            Value::UInt16(_) => TypeTag::UInt16,
            Value::Int32(_) => TypeTag::Int32,
            Value::UInt32(_) => TypeTag::UInt32,
            Value::Int64(_) => TypeTag::Int64,
            Value::UInt64(_) => TypeTag::UInt64,
            Value::Double(_) => TypeTag::Double,
            Value::String(_) => TypeTag::String,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Little-endian payload bytes as written on the wire.
    pub(crate) fn payload(&self) -> Vec<u8> {
        match self {
            Value::Byte(v) => vec![*v],
            Value::Boolean(v) => vec![u8::from(*v)],
            Value::Int16(v) => v.to_le_bytes().to_vec(),
            Value::UInt16(v) => v.to_le_bytes().to_vec(),
            Value::Int32(v) => v.to_le_bytes().to_vec(),
            Value::UInt32(v) => v.to_le_bytes().to_vec(),
            Value::Int64(v) => v.to_le_bytes().to_vec(),
            Value::UInt64(v) => v.to_le_bytes().to_vec(),
            Value::Double(v) => v.to_bits().to_le_bytes().to_vec(),
            Value::String(v) => v.as_bytes().to_vec(),
        }
    }

    /// Inverse of [`Value::payload`]. `None` if `bytes` cannot be a `tag` payload.
    pub(crate) fn from_payload(tag: TypeTag, bytes: &[u8]) -> Option<Value> {
        if let Some(width) = tag.fixed_width() {
            if bytes.len() != width {
                return None;
            }
        }
        let value = match tag {
            TypeTag::Byte => Value::Byte(bytes[0]),
            TypeTag::Boolean => match bytes[0] {
                0 => Value::Boolean(false),
                1 => Value::Boolean(true),
                _ => return None,
            },
            TypeTag::Int16 => Value::Int16(i16::from_le_bytes(bytes.try_into().ok()?)),
            TypeTag::UInt16 => Value::UInt16(u16::from_le_bytes(bytes.try_into().ok()?)),
            TypeTag::Int32 => Value::Int32(i32::from_le_bytes(bytes.try_into().ok()?)),
            TypeTag::UInt32 => Value::UInt32(u32::from_le_bytes(bytes.try_into().ok()?)),
            TypeTag::Int64 => Value::Int64(i64::from_le_bytes(bytes.try_into().ok()?)),
            TypeTag::UInt64 => Value::UInt64(u64::from_le_bytes(bytes.try_into().ok()?)),
            TypeTag::Double => {
                Value::Double(f64::from_bits(u64::from_le_bytes(bytes.try_into().ok()?)))
            }
            TypeTag::String => Value::String(String::from_utf8(bytes.to_vec()).ok()?),
        };
        Some(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Byte(v) => write!(f, "{v}"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Int16(v) => write!(f, "{v}"),
            Value::UInt16(v) => write!(f, "{v}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::UInt32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::UInt64(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int32(value)
    }
}

impl From<i16> for Value {
    fn from(value: i16) -> Self {
        Value::Int16(value)
    }
}

impl From<u8> for Value {
    fn from(value: u8) -> Self {
        Value::Byte(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}
