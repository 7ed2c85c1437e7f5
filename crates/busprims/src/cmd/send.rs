use std::thread;
use std::time::Duration;

use busprims_core::{send, send_cancellable, BusChannel, MessageSpec};
use tokio_util::sync::CancellationToken;

use crate::cmd::{install_ctrlc_handler, Context, SendArgs};
use crate::exit::{core_error, CliError, CliResult, SUCCESS};
use crate::output::print_reply;

const BURST_LEN: i32 = 5;
const BURST_GAP: Duration = Duration::from_millis(100);

pub fn run(args: SendArgs, ctx: &Context) -> CliResult<i32> {
    let config = ctx.load_config()?;
    let iface = config
        .interface(args.interface)
        .map_err(|err| core_error("bad --interface", err))?;
    let spec = iface.message(args.message).ok_or_else(|| {
        CliError::usage(format!(
            "interface {} has no message {} (catalog holds {})",
            iface.name,
            args.message,
            iface.messages.len()
        ))
    })?;

    let cancel = CancellationToken::new();
    install_ctrlc_handler(cancel.clone())?;

    let mut channel = BusChannel::open(&ctx.socket_bus(), iface.sender_channel())
        .map_err(|err| core_error("connect failed", err))?;
    let path = channel.object_path().to_string();
    let reply = send_cancellable(&mut channel, &path, spec, &cancel)
        .map_err(|err| core_error("send failed", err))?;

    print_reply(&iface.name, &spec.name, reply.as_deref(), ctx.format);
    Ok(SUCCESS)
}

/// Payload of a `sendstr`/`sendint` burst.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Burst {
    Text(String),
    Number(i32),
}

impl Burst {
    fn spec(&self, index: i32) -> MessageSpec {
        match self {
            Burst::Text(value) => MessageSpec::new("Test").with(format!("{value}_{index}")),
            Burst::Number(value) => {
                MessageSpec::new("Num").with(value.wrapping_mul(10).wrapping_add(index))
            }
        }
    }
}

/// Broadcast five signals on interface 0, `BURST_GAP` apart.
pub fn run_burst(burst: Burst, ctx: &Context) -> CliResult<i32> {
    let config = ctx.load_config()?;
    let iface = config
        .interface(0)
        .map_err(|err| core_error("no signal interface", err))?;

    let mut channel = BusChannel::open(&ctx.socket_bus(), iface.sender_channel())
        .map_err(|err| core_error("connect failed", err))?;

    for index in 0..BURST_LEN {
        if index > 0 {
            thread::sleep(BURST_GAP);
        }
        let spec = burst.spec(index);
        let reply = send(&mut channel, &spec).map_err(|err| core_error("send failed", err))?;
        print_reply(&iface.name, &spec.name, reply.as_deref(), ctx.format);
    }
    Ok(SUCCESS)
}
