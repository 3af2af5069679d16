//! Connection admission and the per-connection threads.

use std::io;
use std::net::{Shutdown, TcpStream};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::thread;

use tracing::{debug, error, info, warn};

use super::{AcceptError, ClientListener, ENGINE_TARGET, Engine};
use crate::client::{Client, QueueFullHook};
use crate::dispatch::panic_message;
use crate::protocol::{Cipher, GzipCipher, Message};
use crate::transport::{self, ConnectionHandler};

impl Engine {
    /// Admits an accepted stream.
    ///
    /// Configures the socket, builds the cipher and client, registers the
    /// client, runs the new-client listeners, and starts the writer and
    /// receive threads. When the receive thread ends the client is stopped,
    /// unregistered, and the disconnect listeners run once.
    ///
    /// # Errors
    ///
    /// Every failure is confined to this connection; the stream is closed.
    pub fn accept(self: &Arc<Self>, stream: TcpStream) -> Result<Arc<Client>, AcceptError> {
        if !self.is_running() {
            // Refused connections are closed regardless of shutdown errors.
            let _ = stream.shutdown(Shutdown::Both);
            return Err(AcceptError::NotRunning {
                state: self.lifecycle(),
            });
        }

        self.configure_socket(&stream)?;
        let cipher = self.new_cipher();
        let mut client = self
            .create_client(stream, cipher)
            .map_err(|source| AcceptError::CreateClient { source })?;
        client.set_queue_full_hook(self.queue_full_hook());
        let client = Arc::new(client);

        self.registry.add(Arc::clone(&client));
        self.notify(&self.hooks.on_new_client, &client, "new-client");

        if let Err(source) = self.spawn_connection_threads(&client) {
            self.disconnect(&client);
            return Err(AcceptError::Spawn { source });
        }

        info!(
            target: ENGINE_TARGET,
            client = %client.id(),
            peer = %client.peer_addr(),
            clients = self.registry.len(),
            "client connected"
        );
        Ok(client)
    }

    /// Wraps the engine as a listener [`ConnectionHandler`].
    pub fn connection_handler(self: &Arc<Self>) -> Arc<dyn ConnectionHandler> {
        Arc::new(EngineHandler {
            engine: Arc::clone(self),
        })
    }

    fn configure_socket(&self, stream: &TcpStream) -> Result<(), AcceptError> {
        let tuning = &self.settings.tuning;
        match &self.hooks.configure_socket {
            Some(hook) => hook(stream, tuning)?,
            None => transport::configure(stream, tuning)?,
        }
        Ok(())
    }

    fn new_cipher(&self) -> Arc<dyn Cipher> {
        match &self.hooks.new_cipher {
            Some(hook) => hook(),
            None => Arc::new(GzipCipher::default()),
        }
    }

    fn create_client(&self, stream: TcpStream, cipher: Arc<dyn Cipher>) -> io::Result<Client> {
        let tuning = &self.settings.tuning;
        match &self.hooks.create_client {
            Some(hook) => hook(stream, cipher, tuning),
            None => Client::new(stream, cipher, tuning.send_queue_size),
        }
    }

    fn queue_full_hook(&self) -> QueueFullHook {
        match &self.hooks.send_queue_full {
            Some(hook) => Arc::clone(hook),
            None => Arc::new(|client: &Client, message: &Message| {
                warn!(
                    target: ENGINE_TARGET,
                    client = %client.id(),
                    cmd = message.cmd(),
                    "send queue full; message dropped"
                );
            }),
        }
    }

    fn spawn_connection_threads(self: &Arc<Self>, client: &Arc<Client>) -> io::Result<()> {
        let outbound = client
            .take_outbound()
            .ok_or_else(|| io::Error::other("outbound queue already claimed"))?;
        let id = client.id();

        let engine = Arc::clone(self);
        let writer = Arc::clone(client);
        thread::Builder::new()
            .name(format!("tidewire-send-{id}"))
            .spawn(move || engine.run_writer(&writer, &outbound))?;

        let engine = Arc::clone(self);
        let reader = Arc::clone(client);
        thread::Builder::new()
            .name(format!("tidewire-recv-{id}"))
            .spawn(move || engine.run_receiver(&reader))?;
        Ok(())
    }

    fn run_receiver(&self, client: &Arc<Client>) {
        while !client.is_stopped() {
            match self.recv_msg(client) {
                Ok(message) => self.on_message(client, message),
                Err(error) => {
                    debug!(
                        target: ENGINE_TARGET,
                        client = %client.id(),
                        timeout = error.is_timeout(),
                        error = %error,
                        "receive loop ended"
                    );
                    break;
                }
            }
        }
        self.disconnect(client);
    }

    fn run_writer(&self, client: &Client, outbound: &Receiver<Message>) {
        while let Ok(message) = outbound.recv() {
            let frame = match client.seal(&message) {
                Ok(frame) => frame,
                Err(error) => {
                    warn!(
                        target: ENGINE_TARGET,
                        client = %client.id(),
                        cmd = message.cmd(),
                        error = %error,
                        "failed to seal outbound message"
                    );
                    client.stop();
                    break;
                }
            };
            if let Err(error) = self.send(client, &frame) {
                debug!(
                    target: ENGINE_TARGET,
                    client = %client.id(),
                    error = %error,
                    "send failed"
                );
                client.stop();
                break;
            }
        }
    }

    /// Stops `client` and, if it was still registered, removes it and runs the
    /// disconnect listeners.
    pub(crate) fn disconnect(&self, client: &Arc<Client>) {
        client.stop();
        if self.registry.remove(client.id()).is_none() {
            return;
        }
        info!(
            target: ENGINE_TARGET,
            client = %client.id(),
            peer = %client.peer_addr(),
            clients = self.registry.len(),
            "client disconnected"
        );
        self.notify(&self.hooks.on_disconnected, client, "disconnect");
    }

    fn notify(&self, listeners: &[ClientListener], client: &Arc<Client>, kind: &'static str) {
        for listener in listeners {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| listener(client))) {
                error!(
                    target: ENGINE_TARGET,
                    client = %client.id(),
                    listener = kind,
                    panic = panic_message(payload.as_ref()),
                    "listener panicked"
                );
            }
        }
    }
}

/// Feeds listener connections into [`Engine::accept`].
#[derive(Debug)]
pub struct EngineHandler {
    engine: Arc<Engine>,
}

impl ConnectionHandler for EngineHandler {
    fn handle(&self, stream: TcpStream) {
        if let Err(error) = self.engine.accept(stream) {
            warn!(
                target: ENGINE_TARGET,
                error = %error,
                "connection rejected"
            );
        }
    }
}
