use busprims_bus::Connection;
use busprims_message::{Message, Value};
use tracing::{debug, warn};

use crate::channel::BusChannel;
use crate::decoder::first_string;
use crate::error::Result;

/// Prefix servers put in front of the text they echo back.
pub const DEFAULT_REPLY_PREFIX: &str = "RPLY_MSG";

/// Answer `call` with a single string: `prefix` followed by the call's first
/// string argument.
///
/// A call without a leading string is logged and answered with the prefix
/// alone. The reply goes out on `channel`'s connection and is flushed; the
/// returned value is its serial.
pub fn handle_call<C: Connection>(call: Message, channel: &mut BusChannel<C>, prefix: &str) -> Result<u32> {
    let member = call.member().unwrap_or_default().to_string();
    let text = first_string(&call).unwrap_or_else(|mismatch| {
        warn!(interface = channel.interface(), %member, %mismatch, "call argument is not a string");
        String::new()
    });

    let mut reply = Message::new_method_return(&call)?;
    reply.append(&Value::from(format!("{prefix}{text}")))?;
    drop(call);

    let conn = channel.connection_mut();
    let serial = conn.send(reply)?;
    conn.flush()?;
    debug!(%member, serial, "reply sent");
    Ok(serial)
}
