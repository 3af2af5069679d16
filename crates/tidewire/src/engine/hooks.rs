//! Strategy hooks injected into an [`Engine`](super::Engine).
//!
//! Two kinds of slot exist. A *replace* slot holds at most one hook and, when
//! set, substitutes the engine's default behaviour for that step. A *listener*
//! list holds any number of callbacks, run in registration order, each
//! isolated from the others' panics.

use std::fmt;
use std::io;
use std::net::TcpStream;
use std::sync::Arc;

use tidewire_config::SocketTuning;

use crate::client::{Client, QueueFullHook};
use crate::protocol::{Cipher, Message};
use crate::transport::{FrameError, SocketError};

/// Replaces socket configuration for accepted streams.
pub type ConfigureSocketHook =
    Arc<dyn Fn(&TcpStream, &SocketTuning) -> Result<(), SocketError> + Send + Sync>;

/// Produces the cipher for a new connection.
pub type NewCipherHook = Arc<dyn Fn() -> Arc<dyn Cipher> + Send + Sync>;

/// Builds the connection object for an accepted stream.
pub type CreateClientHook =
    Arc<dyn Fn(TcpStream, Arc<dyn Cipher>, &SocketTuning) -> io::Result<Client> + Send + Sync>;

/// Replaces the frame reader.
pub type RecvHook = Arc<dyn Fn(&Client, &SocketTuning) -> Result<Message, FrameError> + Send + Sync>;

/// Replaces the frame writer.
pub type SendHook = Arc<dyn Fn(&Client, &[u8], &SocketTuning) -> Result<(), FrameError> + Send + Sync>;

/// Replaces command dispatch, keepalive handling included.
pub type MessageHook = Arc<dyn Fn(&Arc<Client>, Message) + Send + Sync>;

/// Observes connection arrival or departure.
pub type ClientListener = Arc<dyn Fn(&Arc<Client>) + Send + Sync>;

/// Hook slots consulted by the engine.
#[derive(Clone, Default)]
pub struct Hooks {
    pub(crate) configure_socket: Option<ConfigureSocketHook>,
    pub(crate) new_cipher: Option<NewCipherHook>,
    pub(crate) create_client: Option<CreateClientHook>,
    pub(crate) recv: Option<RecvHook>,
    pub(crate) send: Option<SendHook>,
    pub(crate) on_message: Option<MessageHook>,
    pub(crate) send_queue_full: Option<QueueFullHook>,
    pub(crate) on_new_client: Vec<ClientListener>,
    pub(crate) on_disconnected: Vec<ClientListener>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("configure_socket", &self.configure_socket.is_some())
            .field("new_cipher", &self.new_cipher.is_some())
            .field("create_client", &self.create_client.is_some())
            .field("recv", &self.recv.is_some())
            .field("send", &self.send.is_some())
            .field("on_message", &self.on_message.is_some())
            .field("send_queue_full", &self.send_queue_full.is_some())
            .field("on_new_client", &self.on_new_client.len())
            .field("on_disconnected", &self.on_disconnected.len())
            .finish()
    }
}

impl Hooks {
    /// Empty hook set; every step uses the engine default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces socket configuration.
    #[must_use]
    pub fn configure_socket<F>(mut self, hook: F) -> Self
    where
        F: Fn(&TcpStream, &SocketTuning) -> Result<(), SocketError> + Send + Sync + 'static,
    {
        self.configure_socket = Some(Arc::new(hook));
        self
    }

    /// Replaces cipher construction.
    #[must_use]
    pub fn new_cipher<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> Arc<dyn Cipher> + Send + Sync + 'static,
    {
        self.new_cipher = Some(Arc::new(hook));
        self
    }

    /// Replaces client construction.
    #[must_use]
    pub fn create_client<F>(mut self, hook: F) -> Self
    where
        F: Fn(TcpStream, Arc<dyn Cipher>, &SocketTuning) -> io::Result<Client>
            + Send
            + Sync
            + 'static,
    {
        self.create_client = Some(Arc::new(hook));
        self
    }

    /// Replaces the frame reader.
    #[must_use]
    pub fn recv<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Client, &SocketTuning) -> Result<Message, FrameError> + Send + Sync + 'static,
    {
        self.recv = Some(Arc::new(hook));
        self
    }

    /// Replaces the frame writer.
    #[must_use]
    pub fn send<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Client, &[u8], &SocketTuning) -> Result<(), FrameError> + Send + Sync + 'static,
    {
        self.send = Some(Arc::new(hook));
        self
    }

    /// Replaces command dispatch entirely.
    #[must_use]
    pub fn on_message<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Arc<Client>, Message) + Send + Sync + 'static,
    {
        self.on_message = Some(Arc::new(hook));
        self
    }

    /// Replaces the default warning logged when an outbound queue overflows.
    #[must_use]
    pub fn send_queue_full<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Client, &Message) + Send + Sync + 'static,
    {
        self.send_queue_full = Some(Arc::new(hook));
        self
    }

    /// Appends a listener run after a connection is registered.
    #[must_use]
    pub fn on_new_client<F>(mut self, listener: F) -> Self
    where
        F: Fn(&Arc<Client>) + Send + Sync + 'static,
    {
        self.on_new_client.push(Arc::new(listener));
        self
    }

    /// Appends a listener run after a connection is removed.
    #[must_use]
    pub fn on_disconnected<F>(mut self, listener: F) -> Self
    where
        F: Fn(&Arc<Client>) + Send + Sync + 'static,
    {
        self.on_disconnected.push(Arc::new(listener));
        self
    }
}
