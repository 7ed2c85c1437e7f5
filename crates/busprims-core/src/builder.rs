use busprims_message::Message;

use crate::channel::ChannelConfig;
use crate::error::Result;
use crate::spec::MessageSpec;

/// Turn `spec` into a transport message addressed to `path`.
///
/// Broadcast channels produce a signal, unicast channels a method call to
/// their target name. Fields are appended in order; a body that outgrows
/// the message size limit is an error.
pub fn build_message(channel: &ChannelConfig, path: &str, spec: &MessageSpec) -> Result<Message> {
    let mut msg = match channel.target_name.as_deref() {
        None => Message::new_signal(path, &channel.interface, &spec.name)?,
        Some(target) => Message::new_method_call(target, path, &channel.interface, &spec.name)?,
    };
    for field in &spec.fields {
        msg.append(field)?;
    }
    Ok(msg)
}
