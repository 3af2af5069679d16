//! Triggers that end the serving phase.

use std::io;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use thiserror::Error;
use tracing::info;

use super::PROCESS_TARGET;

/// Signals that stop the server.
pub const TERMINATION_SIGNALS: [i32; 4] = [SIGTERM, SIGINT, SIGQUIT, SIGHUP];

/// Blocks the launch sequence until the server should stop accepting work.
pub trait ShutdownSignal: Send + Sync {
    /// Returns once shutdown should begin.
    fn wait(&self) -> Result<(), ShutdownError>;
}

/// Failures while waiting for a shutdown trigger.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// The signal handlers could not be registered.
    #[error("failed to register termination signals: {source}")]
    Register {
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// The signal iterator ended without delivering a signal.
    #[error("signal stream closed before a termination signal arrived")]
    Closed,
}

/// Waits for one of [`TERMINATION_SIGNALS`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShutdownSignal;

impl ShutdownSignal for SystemShutdownSignal {
    fn wait(&self) -> Result<(), ShutdownError> {
        let mut signals = Signals::new(TERMINATION_SIGNALS)
            .map_err(|source| ShutdownError::Register { source })?;
        let signal = signals.forever().next().ok_or(ShutdownError::Closed)?;
        info!(
            target: PROCESS_TARGET,
            signal = signal_name(signal),
            "termination signal received"
        );
        Ok(())
    }
}

fn signal_name(signal: i32) -> &'static str {
    match signal {
        SIGTERM => "SIGTERM",
        SIGINT => "SIGINT",
        SIGQUIT => "SIGQUIT",
        SIGHUP => "SIGHUP",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(SIGTERM, "SIGTERM")]
    #[case(SIGHUP, "SIGHUP")]
    #[case(0, "unknown")]
    fn signals_are_named_in_logs(#[case] signal: i32, #[case] name: &str) {
        assert_eq!(signal_name(signal), name);
    }

    #[test]
    fn every_termination_signal_has_a_name() {
        for signal in crate::TERMINATION_SIGNALS {
            assert_ne!(signal_name(signal), "unknown");
        }
    }
}
