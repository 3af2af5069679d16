//! Handler signatures, routes, and the execution policy.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use tracing::{error, warn};

use super::DISPATCH_TARGET;
use super::rpc::RpcContext;
use crate::client::Client;
use crate::protocol::Message;

/// Handler for a numeric command.
pub type CommandHandler = Arc<dyn Fn(&Arc<Client>, Message) + Send + Sync>;

/// Handler for an RPC call, either a named method or a numeric RPC command.
pub type RpcHandler = Arc<dyn Fn(RpcContext) + Send + Sync>;

/// Where a handler body runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Execution {
    /// On the connection's receive thread, counted as in flight.
    #[default]
    Inline,
    /// On a detached thread; dispatch returns immediately.
    Detached,
}

/// Target of a registered numeric command.
#[derive(Clone)]
pub(crate) enum Route {
    Command {
        handler: CommandHandler,
        execution: Execution,
    },
    RpcCommand {
        handler: RpcHandler,
        execution: Execution,
    },
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command { execution, .. } => f
                .debug_struct("Command")
                .field("execution", execution)
                .finish_non_exhaustive(),
            Self::RpcCommand { execution, .. } => f
                .debug_struct("RpcCommand")
                .field("execution", execution)
                .finish_non_exhaustive(),
        }
    }
}

impl Route {
    pub(crate) fn invoke(&self, client: &Arc<Client>, message: Message) {
        match self {
            Self::Command { handler, execution } => {
                let handler = Arc::clone(handler);
                let cmd = message.cmd();
                let owner = Arc::clone(client);
                execute(*execution, client, cmd, move || handler(&owner, message));
            }
            Self::RpcCommand { handler, execution } => {
                let handler = Arc::clone(handler);
                let cmd = message.cmd();
                let context = RpcContext::new(String::new(), Arc::clone(client), message);
                execute(*execution, client, cmd, move || handler(context));
            }
        }
    }
}

/// Registered RPC method.
#[derive(Clone)]
pub(crate) struct RpcMethod {
    pub(crate) handler: RpcHandler,
    pub(crate) execution: Execution,
}

impl fmt::Debug for RpcMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcMethod")
            .field("execution", &self.execution)
            .finish_non_exhaustive()
    }
}

/// Runs `body` according to `execution`.
///
/// Inline bodies run on the caller's thread; panic isolation for them is the
/// caller's job. Detached bodies run on a fresh thread with their own panic
/// isolation.
pub(crate) fn execute<F>(execution: Execution, client: &Client, cmd: u32, body: F)
where
    F: FnOnce() + Send + 'static,
{
    match execution {
        Execution::Inline => body(),
        Execution::Detached => {
            let id = client.id();
            let spawned = thread::Builder::new()
                .name(format!("tidewire-handler-{id}"))
                .spawn(move || {
                    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(body)) {
                        error!(
                            target: DISPATCH_TARGET,
                            client = %id,
                            cmd,
                            panic = panic_message(payload.as_ref()),
                            "detached handler panicked"
                        );
                    }
                });
            if let Err(error) = spawned {
                warn!(
                    target: DISPATCH_TARGET,
                    client = %id,
                    cmd,
                    error = %error,
                    "failed to spawn detached handler"
                );
            }
        }
    }
}

/// Extracts the message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
