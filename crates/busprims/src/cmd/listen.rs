use std::time::Duration;

use busprims_core::{
    BusChannel, BusConfig, Dispatcher, InterfaceKind, ListenerSupervisor, ReceivedSignal,
};

use crate::cmd::{install_ctrlc_handler, Context, ListenArgs};
use crate::exit::{core_error, CliError, CliResult, FAILURE, SUCCESS};
use crate::output::{print_reports, print_signal};

/// How often the idle main thread checks on its listeners.
const WATCH_PERIOD: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Print every known signal.
    Receive,
    /// Answer known calls.
    Serve,
}

impl Role {
    fn kind(self) -> InterfaceKind {
        match self {
            Role::Receive => InterfaceKind::Signal,
            Role::Serve => InterfaceKind::Method,
        }
    }
}

pub fn run(role: Role, args: ListenArgs, ctx: &Context) -> CliResult<i32> {
    let config = ctx.load_config()?;
    let indices = select_interfaces(&config, role, args.interfaces)?;

    let bus = ctx.socket_bus();
    let mut supervisor = ListenerSupervisor::new();
    install_ctrlc_handler(supervisor.cancel_token())?;

    let format = ctx.format;
    for index in indices {
        let iface = config
            .interface(index)
            .map_err(|err| core_error("bad --interfaces", err))?;
        let dispatch = iface.dispatch_config(&config);
        let started = match role {
            Role::Receive => supervisor.listen(
                &bus,
                iface.receiver_channel(),
                dispatch,
                move |signal: ReceivedSignal| print_signal(&signal, format),
            ),
            Role::Serve => BusChannel::open(&bus, iface.receiver_channel())
                .and_then(|channel| supervisor.spawn(Dispatcher::new(channel, dispatch))),
        };
        started.map_err(|err| core_error("listener failed to start", err))?;
    }

    supervisor.idle_until_cancelled(WATCH_PERIOD);
    let reports = supervisor.shutdown();
    print_reports(&reports, format);

    if reports.iter().any(|report| report.outcome.is_err()) {
        Ok(FAILURE)
    } else {
        Ok(SUCCESS)
    }
}

fn select_interfaces(
    config: &BusConfig,
    role: Role,
    requested: Option<Vec<usize>>,
) -> CliResult<Vec<usize>> {
    let indices = match requested {
        Some(indices) => indices,
        None => config
            .interfaces
            .iter()
            .enumerate()
            .filter(|(_, iface)| iface.kind == role.kind())
            .map(|(index, _)| index)
            .collect(),
    };
    if indices.is_empty() {
        return Err(CliError::usage(format!(
            "no {:?} interfaces to listen on",
            role.kind()
        )));
    }
    Ok(indices)
}
