use std::path::PathBuf;
use std::time::Duration;

use busprims_bus::SocketBus;
use busprims_core::BusConfig;
use clap::{Args, Subcommand};
use tokio_util::sync::CancellationToken;

use crate::exit::{core_error, CliError, CliResult, FAILURE, USAGE};
use crate::output::OutputFormat;

pub mod daemon;
pub mod listen;
pub mod query;
pub mod send;
pub mod version;

/// Default socket path when neither `--bus` nor `BUSPRIMS_BUS` is set.
pub const DEFAULT_BUS_PATH: &str = "/tmp/busprims.sock";

/// Settings shared by every subcommand.
#[derive(Debug)]
pub struct Context {
    pub bus: PathBuf,
    pub config: Option<PathBuf>,
    pub format: OutputFormat,
}

impl Context {
    pub fn load_config(&self) -> CliResult<BusConfig> {
        match &self.config {
            Some(path) => BusConfig::load(path).map_err(|err| core_error("config rejected", err)),
            None => Ok(BusConfig::default()),
        }
    }

    pub fn socket_bus(&self) -> SocketBus {
        SocketBus::new(&self.bus)
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the bus daemon until interrupted.
    Daemon,
    /// Send one catalog message; calls print their reply.
    Send(SendArgs),
    /// Emit five `Test` signals carrying VALUE_0..VALUE_4.
    Sendstr(SendStrArgs),
    /// Emit five `Num` signals carrying VALUE*10+0..VALUE*10+4.
    Sendint(SendIntArgs),
    /// Call the first method interface with TEXT and print the reply.
    Query(QueryArgs),
    /// Print decoded signals until interrupted.
    Receive(ListenArgs),
    /// Answer method calls until interrupted.
    Serve(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, ctx: &Context) -> CliResult<i32> {
    match command {
        Command::Daemon => daemon::run(ctx),
        Command::Send(args) => send::run(args, ctx),
        Command::Sendstr(args) => send::run_burst(send::Burst::Text(args.value), ctx),
        Command::Sendint(args) => send::run_burst(send::Burst::Number(args.value), ctx),
        Command::Query(args) => query::run(args, ctx),
        Command::Receive(args) => listen::run(listen::Role::Receive, args, ctx),
        Command::Serve(args) => listen::run(listen::Role::Serve, args, ctx),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Interface index in the configuration.
    #[arg(long, short = 'i', default_value = "0")]
    pub interface: usize,
    /// Message index in the interface's catalog.
    #[arg(long, short = 'm', default_value = "0")]
    pub message: usize,
}

#[derive(Args, Debug)]
pub struct SendStrArgs {
    pub value: String,
}

#[derive(Args, Debug)]
pub struct SendIntArgs {
    #[arg(allow_negative_numbers = true)]
    pub value: i32,
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    pub text: String,
    /// Reply timeout (e.g. 2s, 500ms). Default: the interface's own.
    #[arg(long)]
    pub timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Interface indices (comma-separated). Default: every interface of the
    /// matching kind.
    #[arg(long, value_delimiter = ',')]
    pub interfaces: Option<Vec<usize>>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

/// Cancel `token` on Ctrl-C.
pub fn install_ctrlc_handler(token: CancellationToken) -> CliResult<()> {
    ctrlc::set_handler(move || token.cancel())
        .map_err(|err| CliError::new(FAILURE, format!("signal handler setup failed: {err}")))
}
