//! Server launch sequencing and the shutdown order.

use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use tidewire_config::Config;
use tracing::{debug, info, warn};

use crate::dispatch::{Execution, RegistrationError, RpcContext};
use crate::engine::{Engine, Hooks};
use crate::telemetry;
use crate::transport::SocketListener;

use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};
use super::{PROCESS_TARGET, SHUTDOWN_TIMEOUT};

/// RPC method served by the stock binary; it replies with the request body.
pub const ECHO_METHOD: &str = "echo";

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the server configuration.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader returning a fixed configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps `config`.
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Runs the server with configuration from defaults, file, environment, and
/// command line, until a termination signal arrives.
pub fn run_server() -> Result<(), LaunchError> {
    run_server_with(&SystemConfigLoader, &SystemShutdownSignal)
}

/// Runs the server with injected collaborators.
pub(crate) fn run_server_with(
    loader: &dyn ConfigLoader,
    shutdown: &dyn ShutdownSignal,
) -> Result<(), LaunchError> {
    let config = loader.load()?;
    telemetry::initialise(&config)?;
    info!(
        target: PROCESS_TARGET,
        listen = config.listen_address(),
        "starting server"
    );

    let engine = Arc::new(build_engine(&config)?);
    engine.start()?;
    let listener = SocketListener::bind(config.listen_address())?;
    info!(
        target: PROCESS_TARGET,
        address = %listener.local_addr(),
        "listening for connections"
    );
    let listener_handle = listener.start(engine.connection_handler())?;

    shutdown.wait()?;
    info!(
        target: PROCESS_TARGET,
        drain_timeout_ms = SHUTDOWN_TIMEOUT.as_millis(),
        "stopping listener and draining"
    );
    listener_handle.shutdown();
    listener_handle.join()?;
    if let Err(error) = engine.drain(SHUTDOWN_TIMEOUT) {
        warn!(
            target: PROCESS_TARGET,
            error = %error,
            "drain incomplete; closing connections anyway"
        );
    }
    let closed = engine.close_all();
    info!(
        target: PROCESS_TARGET,
        closed,
        "shutdown sequence completed"
    );
    Ok(())
}

/// Builds the engine served by the binary.
pub(crate) fn build_engine(config: &Config) -> Result<Engine, RegistrationError> {
    let mut engine = Engine::new(config.engine_settings(), Hooks::new());
    engine.handle_rpc_method(ECHO_METHOD, Execution::Inline, echo)?;
    Ok(engine)
}

fn echo(context: RpcContext) {
    if let Err(error) = context.reply(context.body().to_vec()) {
        debug!(
            target: PROCESS_TARGET,
            client = %context.client().id(),
            method = context.method(),
            error = %error,
            "echo reply dropped"
        );
    }
}
