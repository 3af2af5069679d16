//! A framed TCP socket-server engine.
//!
//! Peers exchange length-prefixed frames: a fixed 16-byte big-endian header
//! (body length, command code, RPC sequence) followed by a body sealed by a
//! per-connection [`Cipher`](protocol::Cipher). The [`Engine`] reads frames on
//! one thread per connection and routes each message by command code to a
//! registered handler. A reserved command carries RPC calls whose body ends
//! with the method name and its length; those are routed by name instead.
//!
//! Keepalive pings are answered by the engine itself. Every other behaviour
//! can be replaced through [`Hooks`] supplied when the engine is built:
//! socket tuning, cipher and client construction, frame reading and writing,
//! dispatch, and connection lifecycle notifications.
//!
//! Shutdown is cooperative. [`Engine::drain`] stops dispatching new messages
//! and waits, up to a deadline, for handlers already running inline.
//!
//! The `tidewired` binary wires the engine to a [`SocketListener`]
//! with configuration from [`tidewire_config`] and serves a single `echo` RPC
//! method.
//!
//! [`SocketListener`]: transport::SocketListener

pub mod client;
pub mod dispatch;
pub mod engine;
mod process;
pub mod protocol;
pub mod telemetry;
pub mod transport;

pub use client::{Client, ClientId, SendError};
pub use dispatch::{Execution, RegistrationError, RpcContext};
pub use engine::{Engine, Hooks, Lifecycle};
pub use process::{
    ConfigLoader, ECHO_METHOD, LaunchError, ShutdownError, ShutdownSignal, StaticConfigLoader,
    SystemConfigLoader, SystemShutdownSignal, TERMINATION_SIGNALS, run_server,
};
pub use protocol::Message;

#[cfg(test)]
mod test_support;
#[cfg(test)]
mod tests;
