//! Error types for engine lifecycle and connection setup.

use std::io;

use thiserror::Error;

use super::Lifecycle;
use crate::transport::SocketError;

/// Failures while admitting an accepted stream. They affect only that
/// connection.
#[derive(Debug, Error)]
pub enum AcceptError {
    /// The engine is not dispatching traffic.
    #[error("engine is {state}; connection refused")]
    NotRunning { state: Lifecycle },
    /// Socket configuration failed and the stream was shut down.
    #[error(transparent)]
    Socket(#[from] SocketError),
    /// The client factory rejected the stream.
    #[error("failed to create client: {source}")]
    CreateClient {
        #[source]
        source: io::Error,
    },
    /// A connection thread could not be started.
    #[error("failed to spawn connection thread: {source}")]
    Spawn {
        #[source]
        source: io::Error,
    },
}

/// The engine could not start.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("engine cannot start while {state}")]
pub struct StartError {
    /// State the engine was in.
    pub state: Lifecycle,
}

/// Draining gave up before every in-flight handler finished.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("drain timed out with {in_flight} handler(s) still running")]
pub struct DrainError {
    /// Handlers still executing when the timeout expired.
    pub in_flight: usize,
}
