//! Command routing.
//!
//! Numeric commands map to [`CommandHandler`]s or RPC-style handlers in a
//! table guarded by the registration rules in [`RegistrationError`]. Calls on
//! the reserved RPC command are resolved by method name through a second,
//! lazily created table; see [`RpcContext`] for what a method handler
//! receives.

mod errors;
mod handler;
mod rpc;
mod table;

pub use self::errors::RegistrationError;
pub use self::handler::{CommandHandler, Execution, RpcHandler};
pub use self::rpc::{MAX_METHOD_LEN, RpcContext};

pub(crate) use self::handler::{Route, RpcMethod, panic_message};
pub(crate) use self::rpc::dispatch as dispatch_rpc;
pub(crate) use self::table::CommandTable;

pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
