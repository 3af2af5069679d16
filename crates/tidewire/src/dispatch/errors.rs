//! Setup-time registration faults.
//!
//! Every variant signals a programming error in the server's wiring. The
//! binary treats them as fatal before the listener starts.

use thiserror::Error;

use crate::engine::Lifecycle;

/// Errors raised while registering command or RPC handlers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistrationError {
    /// The command code belongs to the engine.
    #[error("command {cmd:#010x} is reserved")]
    ReservedCommand { cmd: u32 },

    /// The command code is not below the user command ceiling.
    #[error("command {cmd:#010x} is not below the user ceiling {ceiling:#010x}")]
    CommandOutOfRange { cmd: u32, ceiling: u32 },

    /// A handler is already registered for the command.
    #[error("handler for command {cmd:#010x} already registered")]
    DuplicateCommand { cmd: u32 },

    /// A handler is already registered for the RPC method.
    #[error("handler for rpc method '{method}' already registered")]
    DuplicateMethod { method: String },

    /// The RPC method name cannot be encoded in the one-byte length trailer.
    #[error("rpc method '{method}' is {len} bytes, should be (1-127)")]
    InvalidMethodName { method: String, len: usize },

    /// Handlers can only be registered before the engine starts.
    #[error("handlers cannot be registered while the engine is {state}")]
    NotConfiguring { state: Lifecycle },
}

impl RegistrationError {
    /// Convenience constructor for duplicate RPC methods.
    pub fn duplicate_method(method: impl Into<String>) -> Self {
        Self::DuplicateMethod {
            method: method.into(),
        }
    }
}
