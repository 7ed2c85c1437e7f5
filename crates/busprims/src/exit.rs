use std::fmt;

use busprims_bus::BusError;
use busprims_core::CoreError;

pub const SUCCESS: i32 = 0;
/// Setup or transmission failed, including reply timeouts.
pub const FAILURE: i32 = 1;
pub const USAGE: i32 = 64;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(USAGE, message)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn bus_error(context: &str, err: BusError) -> CliError {
    match err {
        BusError::InvalidMatchRule { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(FAILURE, format!("{context}: {other}")),
    }
}

pub fn core_error(context: &str, err: CoreError) -> CliError {
    match err {
        CoreError::Bus(err) => bus_error(context, err),
        // Bad indices and rejected tables are caller mistakes.
        CoreError::Config(_) | CoreError::Message(_) => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        other => CliError::new(FAILURE, format!("{context}: {other}")),
    }
}
