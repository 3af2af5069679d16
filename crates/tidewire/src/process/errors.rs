//! Error surface for launching and stopping the server process.

use std::sync::Arc;

use ortho_config::OrthoError;
use thiserror::Error;

use crate::dispatch::RegistrationError;
use crate::engine::StartError;
use crate::telemetry::TelemetryError;
use crate::transport::ListenerError;

use super::shutdown::ShutdownError;

/// Errors surfaced while running the server process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Config {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// The tracing subscriber could not be installed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// A built-in handler could not be registered.
    #[error("failed to register handler: {source}")]
    Registration {
        /// Underlying registration fault.
        #[source]
        source: RegistrationError,
    },
    /// The engine refused to start.
    #[error("failed to start engine: {source}")]
    Start {
        /// Underlying lifecycle error.
        #[source]
        source: StartError,
    },
    /// Socket listener startup or shutdown failed.
    #[error("socket listener failed: {source}")]
    Listener {
        /// Underlying listener error.
        #[source]
        source: ListenerError,
    },
    /// Waiting for shutdown failed.
    #[error("failed to await shutdown signal: {source}")]
    Shutdown {
        /// Underlying shutdown error.
        #[source]
        source: ShutdownError,
    },
}

impl From<Arc<OrthoError>> for LaunchError {
    fn from(source: Arc<OrthoError>) -> Self {
        Self::Config { source }
    }
}

impl From<TelemetryError> for LaunchError {
    fn from(source: TelemetryError) -> Self {
        Self::Telemetry { source }
    }
}

impl From<RegistrationError> for LaunchError {
    fn from(source: RegistrationError) -> Self {
        Self::Registration { source }
    }
}

impl From<StartError> for LaunchError {
    fn from(source: StartError) -> Self {
        Self::Start { source }
    }
}

impl From<ListenerError> for LaunchError {
    fn from(source: ListenerError) -> Self {
        Self::Listener { source }
    }
}

impl From<ShutdownError> for LaunchError {
    fn from(source: ShutdownError) -> Self {
        Self::Shutdown { source }
    }
}
