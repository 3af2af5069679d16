//! The socket-server engine.
//!
//! An [`Engine`] is built and configured through `&mut self` while it is in
//! [`Lifecycle::Configuring`]: handlers are registered, hooks were supplied at
//! construction. [`Engine::start`] opens the dispatch gate; from then on the
//! engine is shared behind an `Arc` and its tables are read-only.
//!
//! Per connection the engine runs two threads. The receive thread reads
//! frames and dispatches them inline, so handling for one connection is
//! serialised unless a handler is registered with [`Execution::Detached`].
//! The writer thread drains the connection's outbound queue.
//!
//! [`Execution::Detached`]: crate::dispatch::Execution::Detached

mod accept;
mod errors;
mod hooks;
mod lifecycle;
mod registry;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tidewire_config::{EngineSettings, SocketTuning};
use tracing::{debug, error, info};

use crate::client::{Client, ClientId};
use crate::dispatch::{
    CommandTable, Execution, RegistrationError, Route, RpcContext, RpcMethod, dispatch_rpc,
    panic_message,
};
use crate::protocol::{CMD_PING, CMD_PING_ACK, CMD_RPC_METHOD, Message};
use crate::transport::{self, FrameError};

pub use self::accept::EngineHandler;
pub use self::errors::{AcceptError, DrainError, StartError};
pub use self::hooks::{
    ClientListener, ConfigureSocketHook, CreateClientHook, Hooks, MessageHook, NewCipherHook,
    RecvHook, SendHook,
};
pub use self::lifecycle::Lifecycle;

use self::lifecycle::{InFlight, LifecycleCell};
use self::registry::Registry;

pub(crate) const ENGINE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::engine");

/// Dispatch core shared by every connection.
pub struct Engine {
    settings: EngineSettings,
    hooks: Hooks,
    table: CommandTable,
    registry: Registry,
    lifecycle: LifecycleCell,
    in_flight: InFlight,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("settings", &self.settings)
            .field("hooks", &self.hooks)
            .field("lifecycle", &self.lifecycle.get())
            .field("clients", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Creates an engine in [`Lifecycle::Configuring`].
    pub fn new(settings: EngineSettings, hooks: Hooks) -> Self {
        let table = CommandTable::new(settings.user_command_max);
        Self {
            settings,
            hooks,
            table,
            registry: Registry::default(),
            lifecycle: LifecycleCell::new(),
            in_flight: InFlight::default(),
        }
    }

    /// Settings the engine was built with.
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Socket options and frame limits.
    pub fn tuning(&self) -> &SocketTuning {
        &self.settings.tuning
    }

    /// Registers `handler` for the numeric command `cmd`.
    ///
    /// # Errors
    ///
    /// Fails when `cmd` is reserved, not below the user ceiling, already
    /// registered, or when the engine has left [`Lifecycle::Configuring`].
    pub fn handle<F>(
        &mut self,
        cmd: u32,
        execution: Execution,
        handler: F,
    ) -> Result<(), RegistrationError>
    where
        F: Fn(&Arc<Client>, Message) + Send + Sync + 'static,
    {
        self.ensure_configuring()?;
        self.table.register(
            cmd,
            Route::Command {
                handler: Arc::new(handler),
                execution,
            },
        )
    }

    /// Registers an RPC-style handler for the numeric command `cmd`. The
    /// handler receives an [`RpcContext`] with an empty method name and the
    /// untouched message.
    ///
    /// # Errors
    ///
    /// Same rules as [`Engine::handle`].
    pub fn handle_rpc_cmd<F>(
        &mut self,
        cmd: u32,
        execution: Execution,
        handler: F,
    ) -> Result<(), RegistrationError>
    where
        F: Fn(RpcContext) + Send + Sync + 'static,
    {
        self.ensure_configuring()?;
        self.table.register(
            cmd,
            Route::RpcCommand {
                handler: Arc::new(handler),
                execution,
            },
        )
    }

    /// Registers `handler` for the RPC method `method`.
    ///
    /// # Errors
    ///
    /// Fails when the method is already registered, when its name is not 1 to
    /// 127 bytes long, or when the engine has left [`Lifecycle::Configuring`].
    pub fn handle_rpc_method<F>(
        &mut self,
        method: &str,
        execution: Execution,
        handler: F,
    ) -> Result<(), RegistrationError>
    where
        F: Fn(RpcContext) + Send + Sync + 'static,
    {
        self.ensure_configuring()?;
        self.table.register_method(
            method,
            RpcMethod {
                handler: Arc::new(handler),
                execution,
            },
        )
    }

    fn ensure_configuring(&self) -> Result<(), RegistrationError> {
        match self.lifecycle.get() {
            Lifecycle::Configuring => Ok(()),
            state => Err(RegistrationError::NotConfiguring { state }),
        }
    }

    /// Opens the dispatch gate.
    ///
    /// # Errors
    ///
    /// Fails unless the engine is still configuring.
    pub fn start(&self) -> Result<(), StartError> {
        self.lifecycle
            .transition(Lifecycle::Configuring, Lifecycle::Running)
            .map_err(|state| StartError { state })?;
        info!(
            target: ENGINE_TARGET,
            user_command_max = self.table.ceiling(),
            "engine running"
        );
        Ok(())
    }

    /// Current lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.get()
    }

    /// Returns `true` while messages are dispatched.
    pub fn is_running(&self) -> bool {
        self.lifecycle.get() == Lifecycle::Running
    }

    /// Number of synchronous dispatches currently executing.
    pub fn in_flight(&self) -> usize {
        self.in_flight.count()
    }

    /// Number of registered connections.
    pub fn client_count(&self) -> usize {
        self.registry.len()
    }

    /// Looks up a registered connection.
    pub fn client(&self, id: ClientId) -> Option<Arc<Client>> {
        self.registry.get(id)
    }

    /// Reads one message from `client` using the recv hook or the default
    /// frame reader.
    ///
    /// # Errors
    ///
    /// Any read, limit, or decode failure; the connection should be dropped.
    pub fn recv_msg(&self, client: &Client) -> Result<Message, FrameError> {
        match &self.hooks.recv {
            Some(hook) => hook(client, &self.settings.tuning),
            None => transport::read_message(client, &self.settings.tuning),
        }
    }

    /// Writes a sealed frame to `client` using the send hook or the default
    /// frame writer.
    ///
    /// # Errors
    ///
    /// Any write failure or short write. The default writer stops the client.
    pub fn send(&self, client: &Client, frame: &[u8]) -> Result<(), FrameError> {
        match &self.hooks.send {
            Some(hook) => hook(client, frame, &self.settings.tuning),
            None => transport::write_frame(client, frame, &self.settings.tuning),
        }
    }

    /// Dispatches one inbound message.
    ///
    /// Messages are dropped unless the engine is running. The `on_message`
    /// hook, when set, replaces everything else. Otherwise pings are answered,
    /// ping acknowledgements discarded, and other commands routed through the
    /// command table. Handler panics are logged and contained.
    pub fn on_message(&self, client: &Arc<Client>, message: Message) {
        // Entering before the gate check lets `drain` observe every dispatch
        // that got past it.
        let _in_flight = self.in_flight.enter();
        if !self.is_running() {
            return;
        }

        let cmd = message.cmd();
        if let Some(hook) = &self.hooks.on_message {
            self.contain(client, cmd, || hook(client, message));
            return;
        }

        match cmd {
            CMD_PING => {
                if let Err(error) = client.send_msg(Message::new(CMD_PING_ACK, Vec::new())) {
                    debug!(
                        target: ENGINE_TARGET,
                        client = %client.id(),
                        error = %error,
                        "failed to answer ping"
                    );
                }
            }
            CMD_PING_ACK => {}
            CMD_RPC_METHOD if self.table.serves_rpc() => {
                self.contain(client, cmd, || dispatch_rpc(&self.table, client, message));
            }
            _ => match self.table.route(cmd) {
                Some(route) => self.contain(client, cmd, || route.invoke(client, message)),
                None => debug!(
                    target: ENGINE_TARGET,
                    client = %client.id(),
                    cmd,
                    "no handler for command"
                ),
            },
        }
    }

    fn contain(&self, client: &Client, cmd: u32, body: impl FnOnce()) {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(body)) {
            error!(
                target: ENGINE_TARGET,
                client = %client.id(),
                cmd,
                panic = panic_message(payload.as_ref()),
                "handler panicked"
            );
        }
    }

    /// Queues `message` on every registered connection. Returns how many
    /// accepted it; failures are logged and skipped.
    pub fn broadcast(&self, message: &Message) -> usize {
        self.registry.broadcast(message)
    }

    /// Stops dispatching and waits up to `timeout` for in-flight handlers.
    ///
    /// The engine ends in [`Lifecycle::Stopped`] either way. Running handlers
    /// are never interrupted.
    ///
    /// # Errors
    ///
    /// Returns [`DrainError`] when handlers were still running at the
    /// deadline.
    pub fn drain(&self, timeout: Duration) -> Result<(), DrainError> {
        if self.lifecycle.get() != Lifecycle::Stopped {
            self.lifecycle.set(Lifecycle::Draining);
        }
        info!(
            target: ENGINE_TARGET,
            in_flight = self.in_flight.count(),
            timeout_ms = timeout.as_millis(),
            "draining engine"
        );
        let result = self
            .in_flight
            .wait_idle(timeout)
            .map_err(|in_flight| DrainError { in_flight });
        self.lifecycle.set(Lifecycle::Stopped);
        result
    }

    /// Stops every registered connection. Returns how many were stopped.
    pub fn close_all(&self) -> usize {
        let clients = self.registry.snapshot();
        let stopped = clients.iter().filter(|client| client.stop()).count();
        info!(
            target: ENGINE_TARGET,
            stopped,
            "closed all connections"
        );
        stopped
    }
}
