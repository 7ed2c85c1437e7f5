//! Positional decoding of message arguments.
//!
//! There is no schema: each argument carries its own type code and is read
//! where it sits. Unknown codes are reported and skipped, never fatal.

use std::iter::FusedIterator;

use busprims_message::{ArgCursor, ArgType, Message, Value};
use serde::Serialize;
use tracing::debug;

/// One argument as found in a message.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedField {
    /// Zero-based index in the argument list.
    pub position: usize,
    pub kind: ArgType,
    /// `None` for argument types this crate does not know.
    pub value: Option<Value>,
}

impl DecodedField {
    pub fn is_known(&self) -> bool {
        matches!(self.kind, ArgType::Known(_))
    }
}

impl Serialize for DecodedField {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("DecodedField", 3)?;
        state.serialize_field("position", &self.position)?;
        state.serialize_field("type", &self.kind.to_string())?;
        state.serialize_field("value", &self.value.as_ref().map(value_json))?;
        state.end()
    }
}

fn value_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Byte(v) => (*v).into(),
        Value::Boolean(v) => (*v).into(),
        Value::Int16(v) => (*v).into(),
        Value::UInt16(v) => (*v).into(),
        Value::Int32(v) => (*v).into(),
        Value::UInt32(v) => (*v).into(),
        Value::Int64(v) => (*v).into(),
        Value::UInt64(v) => (*v).into(),
        Value::Double(v) => (*v).into(),
        Value::String(v) => v.clone().into(),
    }
}

/// Forward-only iterator over a message's arguments. See [`decode`].
#[derive(Debug, Clone)]
pub struct Fields<'a> {
    cursor: ArgCursor<'a>,
    done: bool,
}

impl Iterator for Fields<'_> {
    type Item = DecodedField;

    fn next(&mut self) -> Option<DecodedField> {
        if self.done {
            return None;
        }
        let Some(kind) = self.cursor.current_type() else {
            self.done = true;
            return None;
        };
        let position = self.cursor.position();
        let value = match kind {
            ArgType::Known(_) => self.cursor.read(),
            ArgType::Unknown(code) => {
                debug!(position, code, "skipping argument of unknown type");
                None
            }
        };
        if !self.cursor.advance() {
            self.done = true;
        }
        Some(DecodedField {
            position,
            kind,
            value,
        })
    }
}

impl FusedIterator for Fields<'_> {}

/// Walk the arguments of `msg` in order.
///
/// A message without arguments yields nothing.
pub fn decode(msg: &Message) -> Fields<'_> {
    Fields {
        cursor: msg.args(),
        done: false,
    }
}

/// Why [`first_string`] found no string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FieldMismatch {
    #[error("message has no arguments")]
    NoArguments,
    #[error("first argument is {0}, not a string")]
    NotAString(ArgType),
}

/// The first argument of `msg`, which must be a string.
pub fn first_string(msg: &Message) -> Result<String, FieldMismatch> {
    let field = decode(msg).next().ok_or(FieldMismatch::NoArguments)?;
    match field.value {
        Some(Value::String(text)) => Ok(text),
        _ => Err(FieldMismatch::NotAString(field.kind)),
    }
}

#[cfg(test)]
mod tests {
    use busprims_message::TypeTag;

    use super::*;

    fn signal_with(values: &[Value]) -> Message {
        let mut msg = Message::new_signal("/test/signal/Object", "test.signal.Type", "msg000").unwrap();
        for value in values {
            msg.append(value).unwrap();
        }
        msg
    }

    #[test]
    fn decodes_positions_and_types() {
        let msg = signal_with(&[Value::from("asdf"), Value::Int32(234), Value::from("TEST!!!")]);
        let fields: Vec<DecodedField> = decode(&msg).collect();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].kind, ArgType::Known(TypeTag::String));
        assert_eq!(fields[1].position, 1);
        assert_eq!(fields[1].value, Some(Value::Int32(234)));
        assert_eq!(fields[2].value, Some(Value::from("TEST!!!")));
    }

    #[test]
    fn empty_message_yields_nothing() {
        let msg = signal_with(&[]);
        assert_eq!(decode(&msg).count(), 0);
        assert_eq!(first_string(&msg), Err(FieldMismatch::NoArguments));
    }

    #[test]
    fn unknown_codes_are_reported_and_skipped() {
        let mut msg = signal_with(&[Value::Int16(5)]);
        msg.append_opaque(b'v', &[1, 2, 3]).unwrap();
        msg.append(&Value::Byte(9)).unwrap();

        let fields: Vec<DecodedField> = decode(&msg).collect();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[1].kind, ArgType::Unknown(b'v'));
        assert!(!fields[1].is_known());
        assert_eq!(fields[1].value, None);
        assert_eq!(fields[2].value, Some(Value::Byte(9)));
    }

    #[test]
    fn iterator_stays_finished() {
        let msg = signal_with(&[Value::Byte(1)]);
        let mut fields = decode(&msg);
        assert!(fields.next().is_some());
        assert!(fields.next().is_none());
        assert!(fields.next().is_none());
    }

    #[test]
    fn first_string_checks_type() {
        assert_eq!(
            first_string(&signal_with(&[Value::from("hi"), Value::Int32(1)])),
            Ok("hi".to_string())
        );
        assert_eq!(
            first_string(&signal_with(&[Value::Int32(1)])),
            Err(FieldMismatch::NotAString(ArgType::Known(TypeTag::Int32)))
        );
    }

    #[test]
    fn serializes_for_output() {
        let msg = signal_with(&[Value::Int32(234)]);
        let field = decode(&msg).next().unwrap();
        assert_eq!(
            serde_json::to_value(&field).unwrap(),
            serde_json::json!({"position": 0, "type": "int32", "value": 234})
        );
    }
}
