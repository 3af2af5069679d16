//! Process entry point: configuration, telemetry, and the shutdown sequence.

use std::time::Duration;

mod errors;
mod launch;
mod shutdown;

pub use errors::LaunchError;
pub use launch::{ConfigLoader, ECHO_METHOD, StaticConfigLoader, SystemConfigLoader, run_server};
pub use shutdown::{
    ShutdownError, ShutdownSignal, SystemShutdownSignal, TERMINATION_SIGNALS,
};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
pub(crate) const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);
