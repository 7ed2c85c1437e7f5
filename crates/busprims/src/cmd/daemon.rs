use busprims_bus::BusDaemon;
use tokio_util::sync::CancellationToken;

use crate::cmd::{install_ctrlc_handler, Context};
use crate::exit::{bus_error, CliResult, SUCCESS};

pub fn run(ctx: &Context) -> CliResult<i32> {
    let daemon = BusDaemon::bind(&ctx.bus).map_err(|err| bus_error("bind failed", err))?;

    let cancel = CancellationToken::new();
    install_ctrlc_handler(cancel.clone())?;

    daemon
        .run(&cancel)
        .map_err(|err| bus_error("daemon failed", err))?;
    Ok(SUCCESS)
}
