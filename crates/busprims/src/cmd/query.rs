use busprims_core::{send_cancellable, BusChannel, InterfaceKind, MessageSpec};
use tokio_util::sync::CancellationToken;

use crate::cmd::{install_ctrlc_handler, parse_duration, Context, QueryArgs};
use crate::exit::{core_error, CliError, CliResult, SUCCESS};
use crate::output::print_reply;

pub fn run(args: QueryArgs, ctx: &Context) -> CliResult<i32> {
    let config = ctx.load_config()?;
    let iface = config
        .first_of(InterfaceKind::Method)
        .map_err(|err| core_error("cannot query", err))?;
    let member = iface
        .members
        .first()
        .ok_or_else(|| CliError::usage(format!("interface {} has no members", iface.name)))?;

    let mut channel_config = iface.sender_channel();
    if let Some(timeout) = &args.timeout {
        channel_config.reply_timeout = Some(parse_duration(timeout)?);
    }

    let cancel = CancellationToken::new();
    install_ctrlc_handler(cancel.clone())?;

    let mut channel = BusChannel::open(&ctx.socket_bus(), channel_config)
        .map_err(|err| core_error("connect failed", err))?;
    let spec = MessageSpec::new(member.as_str()).with(args.text);
    let path = channel.object_path().to_string();
    let reply = send_cancellable(&mut channel, &path, &spec, &cancel)
        .map_err(|err| core_error("query failed", err))?;

    print_reply(&iface.name, member, reply.as_deref(), ctx.format);
    Ok(SUCCESS)
}
