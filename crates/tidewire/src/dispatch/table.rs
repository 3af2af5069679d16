//! Command and RPC method tables with their registration rules.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use super::RegistrationError;
use super::handler::{Route, RpcMethod};
use super::rpc::MAX_METHOD_LEN;
use crate::protocol::is_reserved;

/// Numeric routes plus the lazily created RPC method table.
#[derive(Debug)]
pub(crate) struct CommandTable {
    ceiling: u32,
    routes: HashMap<u32, Route>,
    methods: Option<HashMap<String, RpcMethod>>,
}

impl CommandTable {
    pub(crate) fn new(ceiling: u32) -> Self {
        Self {
            ceiling,
            routes: HashMap::new(),
            methods: None,
        }
    }

    /// Registers `route` for `cmd`.
    ///
    /// Checks run in order: reserved code, ceiling, duplicate. A failed
    /// registration leaves the table untouched.
    pub(crate) fn register(&mut self, cmd: u32, route: Route) -> Result<(), RegistrationError> {
        if is_reserved(cmd) {
            return Err(RegistrationError::ReservedCommand { cmd });
        }
        if cmd >= self.ceiling {
            return Err(RegistrationError::CommandOutOfRange {
                cmd,
                ceiling: self.ceiling,
            });
        }
        match self.routes.entry(cmd) {
            Entry::Occupied(_) => Err(RegistrationError::DuplicateCommand { cmd }),
            Entry::Vacant(slot) => {
                slot.insert(route);
                Ok(())
            }
        }
    }

    /// Registers an RPC method, creating the method table on first use.
    pub(crate) fn register_method(
        &mut self,
        method: &str,
        entry: RpcMethod,
    ) -> Result<(), RegistrationError> {
        if method.is_empty() || method.len() > MAX_METHOD_LEN {
            return Err(RegistrationError::InvalidMethodName {
                method: method.to_owned(),
                len: method.len(),
            });
        }
        let methods = self.methods.get_or_insert_with(HashMap::new);
        match methods.entry(method.to_owned()) {
            Entry::Occupied(_) => Err(RegistrationError::duplicate_method(method)),
            Entry::Vacant(slot) => {
                slot.insert(entry);
                Ok(())
            }
        }
    }

    pub(crate) fn route(&self, cmd: u32) -> Option<&Route> {
        self.routes.get(&cmd)
    }

    pub(crate) fn method(&self, method: &str) -> Option<&RpcMethod> {
        self.methods.as_ref().and_then(|methods| methods.get(method))
    }

    /// Returns `true` once at least one RPC method is registered.
    pub(crate) fn serves_rpc(&self) -> bool {
        self.methods.is_some()
    }

    pub(crate) fn ceiling(&self) -> u32 {
        self.ceiling
    }
}
