use std::fmt;

use bytes::BytesMut;

use crate::args::{append_raw, ArgCursor};
use crate::error::{MessageError, Result};
use crate::names::{
    validate_bus_name, validate_error_name, validate_interface, validate_member, validate_path,
};
use crate::value::Value;

/// Largest body a message may carry: 64 KiB.
pub const MAX_BODY_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// One-way broadcast.
    Signal,
    /// Request expecting exactly one return or error.
    MethodCall,
    MethodReturn,
    Error,
}

impl MessageKind {
    pub(crate) fn code(self) -> u8 {
        match self {
            MessageKind::Signal => 1,
            MessageKind::MethodCall => 2,
            MessageKind::MethodReturn => 3,
            MessageKind::Error => 4,
        }
    }

    pub(crate) fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(MessageKind::Signal),
            2 => Some(MessageKind::MethodCall),
            3 => Some(MessageKind::MethodReturn),
            4 => Some(MessageKind::Error),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Signal => "signal",
            MessageKind::MethodCall => "method_call",
            MessageKind::MethodReturn => "method_return",
            MessageKind::Error => "error",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bus message: routing header plus an ordered argument body.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub(crate) kind: MessageKind,
    pub(crate) serial: u32,
    pub(crate) reply_serial: Option<u32>,
    pub(crate) sender: Option<String>,
    pub(crate) destination: Option<String>,
    pub(crate) path: Option<String>,
    pub(crate) interface: Option<String>,
    pub(crate) member: Option<String>,
    pub(crate) error_name: Option<String>,
    pub(crate) body: BytesMut,
}

impl Message {
    fn empty(kind: MessageKind) -> Self {
        Self {
            kind,
            serial: 0,
            reply_serial: None,
            sender: None,
            destination: None,
            path: None,
            interface: None,
            member: None,
            error_name: None,
            body: BytesMut::new(),
        }
    }

    /// A broadcast signal `interface.member` emitted from `path`.
    pub fn new_signal(path: &str, interface: &str, member: &str) -> Result<Self> {
        validate_path(path)?;
        validate_interface(interface)?;
        validate_member(member)?;
        Ok(Self {
            path: Some(path.to_string()),
            interface: Some(interface.to_string()),
            member: Some(member.to_string()),
            ..Self::empty(MessageKind::Signal)
        })
    }

    /// A method call on the object at `path` owned by `destination`.
    pub fn new_method_call(
        destination: &str,
        path: &str,
        interface: &str,
        member: &str,
    ) -> Result<Self> {
        validate_bus_name(destination)?;
        validate_path(path)?;
        validate_interface(interface)?;
        validate_member(member)?;
        Ok(Self {
            destination: Some(destination.to_string()),
            path: Some(path.to_string()),
            interface: Some(interface.to_string()),
            member: Some(member.to_string()),
            ..Self::empty(MessageKind::MethodCall)
        })
    }

    /// The successful reply to `call`, addressed back to its sender.
    pub fn new_method_return(call: &Message) -> Result<Self> {
        if call.kind != MessageKind::MethodCall {
            return Err(MessageError::NotAMethodCall);
        }
        Ok(Self {
            reply_serial: Some(call.serial),
            destination: call.sender.clone(),
            ..Self::empty(MessageKind::MethodReturn)
        })
    }

    /// An error reply to `call` carrying `text` as its single argument.
    pub fn new_error(call: &Message, error_name: &str, text: &str) -> Result<Self> {
        if call.kind != MessageKind::MethodCall {
            return Err(MessageError::NotAMethodCall);
        }
        validate_error_name(error_name)?;
        let mut error = Self {
            reply_serial: Some(call.serial),
            destination: call.sender.clone(),
            error_name: Some(error_name.to_string()),
            ..Self::empty(MessageKind::Error)
        };
        error.append(&Value::from(text))?;
        Ok(error)
    }

    /// Append one argument to the end of the body.
    pub fn append(&mut self, value: &Value) -> Result<()> {
        append_raw(
            &mut self.body,
            value.type_tag().code(),
            &value.payload(),
            MAX_BODY_SIZE,
        )
    }

    /// Append an argument of a type this crate does not model.
    ///
    /// Lets forwarding code keep arguments it cannot interpret.
    pub fn append_opaque(&mut self, code: u8, payload: &[u8]) -> Result<()> {
        append_raw(&mut self.body, code, payload, MAX_BODY_SIZE)
    }

    /// Cursor positioned on the first argument.
    pub fn args(&self) -> ArgCursor<'_> {
        ArgCursor::new(&self.body)
    }

    pub fn has_args(&self) -> bool {
        !self.body.is_empty()
    }

    pub fn is_signal(&self, interface: &str, member: &str) -> bool {
        self.kind == MessageKind::Signal
            && self.interface.as_deref() == Some(interface)
            && self.member.as_deref() == Some(member)
    }

    pub fn is_method_call(&self, interface: &str, member: &str) -> bool {
        self.kind == MessageKind::MethodCall
            && self.interface.as_deref() == Some(interface)
            && self.member.as_deref() == Some(member)
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Serial assigned by the sending connection; 0 before sending.
    pub fn serial(&self) -> u32 {
        self.serial
    }

    pub fn set_serial(&mut self, serial: u32) {
        self.serial = serial;
    }

    pub fn reply_serial(&self) -> Option<u32> {
        self.reply_serial
    }

    /// Unique name of the sending connection, stamped by the bus.
    pub fn sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }

    pub fn set_sender(&mut self, sender: impl Into<String>) {
        self.sender = Some(sender.into());
    }

    pub fn destination(&self) -> Option<&str> {
        self.destination.as_deref()
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn interface(&self) -> Option<&str> {
        self.interface.as_deref()
    }

    pub fn member(&self) -> Option<&str> {
        self.member.as_deref()
    }

    pub fn error_name(&self) -> Option<&str> {
        self.error_name.as_deref()
    }

    pub fn body_len(&self) -> usize {
        self.body.len()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} serial={}", self.kind, self.serial)?;
        if let Some(path) = &self.path {
            write!(f, " path={path}")?;
        }
        if let (Some(iface), Some(member)) = (&self.interface, &self.member) {
            write!(f, " member={iface}.{member}")?;
        }
        if let Some(name) = &self.error_name {
            write!(f, " error={name}")?;
        }
        if let Some(reply) = self.reply_serial {
            write!(f, " reply_serial={reply}")?;
        }
        Ok(())
    }
}
