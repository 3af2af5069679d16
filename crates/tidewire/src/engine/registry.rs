//! Set of live connections.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use super::ENGINE_TARGET;
use crate::client::{Client, ClientId};
use crate::protocol::Message;

#[derive(Debug, Default)]
pub(crate) struct Registry {
    clients: RwLock<HashMap<ClientId, Arc<Client>>>,
}

impl Registry {
    pub(crate) fn add(&self, client: Arc<Client>) {
        self.write().insert(client.id(), client);
    }

    pub(crate) fn remove(&self, id: ClientId) -> Option<Arc<Client>> {
        self.write().remove(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.read().len()
    }

    pub(crate) fn get(&self, id: ClientId) -> Option<Arc<Client>> {
        self.read().get(&id).cloned()
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<Client>> {
        self.read().values().cloned().collect()
    }

    /// Queues `message` on every registered client and returns how many
    /// accepted it. The read lock is held throughout, so membership cannot
    /// change mid-broadcast.
    pub(crate) fn broadcast(&self, message: &Message) -> usize {
        let clients = self.read();
        let mut delivered = 0;
        for client in clients.values() {
            match client.send_msg(message.clone()) {
                Ok(()) => delivered += 1,
                Err(error) => {
                    debug!(
                        target: ENGINE_TARGET,
                        client = %client.id(),
                        cmd = message.cmd(),
                        error = %error,
                        "broadcast skipped client"
                    );
                }
            }
        }
        delivered
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<ClientId, Arc<Client>>> {
        self.clients
            .read()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ClientId, Arc<Client>>> {
        self.clients
            .write()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}
