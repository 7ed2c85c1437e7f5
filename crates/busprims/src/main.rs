mod cmd;
mod exit;
mod logging;
mod output;

use std::path::PathBuf;

use clap::Parser;

use crate::cmd::{Command, Context, DEFAULT_BUS_PATH};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "busprims", version, about = "Message bus signals and calls CLI")]
struct Cli {
    /// Bus daemon socket path.
    #[arg(long, value_name = "PATH", env = "BUSPRIMS_BUS", default_value = DEFAULT_BUS_PATH, global = true)]
    bus: PathBuf,

    /// JSON file with interfaces and message catalogs. Default: built-in tables.
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() {
                exit::USAGE
            } else {
                exit::SUCCESS
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };
    init_logging(cli.log_format, cli.log_level);

    let ctx = Context {
        bus: cli.bus,
        config: cli.config,
        format: cli.format.unwrap_or_else(OutputFormat::default_for_stdout),
    };
    let result = cmd::run(cli.command, &ctx);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}
