//! Per-connection state.
//!
//! A [`Client`] owns the accepted stream, the sequence counters and keys fed
//! to its cipher, and a bounded outbound queue drained by a dedicated writer
//! thread. Handlers reach the wire exclusively through [`Client::send_msg`].

use std::fmt;
use std::io;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;

use crate::protocol::{Cipher, Message, ProtocolError};

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

/// Invoked when a message cannot be queued because the outbound queue is full.
pub type QueueFullHook = Arc<dyn Fn(&Client, &Message) + Send + Sync>;

/// Process-unique connection identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    fn next() -> Self {
        Self(NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Numeric form of the identifier.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Failures raised when queueing an outbound message.
#[derive(Debug, Error)]
pub enum SendError {
    /// The outbound queue is at capacity.
    #[error("send queue of client {client} is full")]
    QueueFull {
        /// Client whose queue overflowed.
        client: ClientId,
    },
    /// The client has been stopped.
    #[error("client {client} is closed")]
    Closed {
        /// Client that refused the message.
        client: ClientId,
    },
}

/// A live connection.
pub struct Client {
    id: ClientId,
    stream: TcpStream,
    peer: SocketAddr,
    cipher: Arc<dyn Cipher>,
    recv_seq: AtomicU64,
    send_seq: AtomicU64,
    recv_key: AtomicU32,
    send_key: AtomicU32,
    outbound: Mutex<Option<SyncSender<Message>>>,
    pending: Mutex<Option<Receiver<Message>>>,
    queue_full: Option<QueueFullHook>,
    stopped: AtomicBool,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Wraps an accepted stream.
    ///
    /// `queue_size` bounds the outbound queue; it is raised to one so the
    /// queue never degenerates into a rendezvous channel.
    pub fn new(stream: TcpStream, cipher: Arc<dyn Cipher>, queue_size: usize) -> io::Result<Self> {
        let peer = stream.peer_addr()?;
        let (sender, receiver) = mpsc::sync_channel(queue_size.max(1));
        Ok(Self {
            id: ClientId::next(),
            stream,
            peer,
            cipher,
            recv_seq: AtomicU64::new(0),
            send_seq: AtomicU64::new(0),
            recv_key: AtomicU32::new(0),
            send_key: AtomicU32::new(0),
            outbound: Mutex::new(Some(sender)),
            pending: Mutex::new(Some(receiver)),
            queue_full: None,
            stopped: AtomicBool::new(false),
        })
    }

    /// Installs the hook run when the outbound queue overflows.
    pub fn set_queue_full_hook(&mut self, hook: QueueFullHook) {
        self.queue_full = Some(hook);
    }

    /// Connection identifier.
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Remote address captured at accept time.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Underlying stream.
    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }

    /// Cipher assigned to this connection.
    pub fn cipher(&self) -> &dyn Cipher {
        self.cipher.as_ref()
    }

    /// Replaces both directional keys.
    pub fn set_keys(&self, recv_key: u32, send_key: u32) {
        self.recv_key.store(recv_key, Ordering::SeqCst);
        self.send_key.store(send_key, Ordering::SeqCst);
    }

    /// Key used to open inbound bodies.
    pub fn recv_key(&self) -> u32 {
        self.recv_key.load(Ordering::SeqCst)
    }

    /// Key used to seal outbound bodies.
    pub fn send_key(&self) -> u32 {
        self.send_key.load(Ordering::SeqCst)
    }

    /// Returns the current receive sequence and advances it.
    pub fn next_recv_seq(&self) -> u64 {
        self.recv_seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Returns the current send sequence and advances it.
    pub fn next_send_seq(&self) -> u64 {
        self.send_seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Seals `message` for the wire using the next send sequence.
    pub fn seal(&self, message: &Message) -> Result<Vec<u8>, ProtocolError> {
        let sequence = self.next_send_seq();
        message.seal(sequence, self.send_key(), self.cipher())
    }

    /// Queues `message` for the writer thread.
    ///
    /// A full queue runs the queue-full hook before the error is returned.
    pub fn send_msg(&self, message: Message) -> Result<(), SendError> {
        let closed = SendError::Closed { client: self.id };
        if self.is_stopped() {
            return Err(closed);
        }
        let outbound = lock(&self.outbound);
        let Some(sender) = outbound.as_ref() else {
            return Err(closed);
        };
        match sender.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(message)) => {
                drop(outbound);
                if let Some(hook) = &self.queue_full {
                    hook(self, &message);
                }
                Err(SendError::QueueFull { client: self.id })
            }
            Err(TrySendError::Disconnected(_)) => Err(closed),
        }
    }

    /// Hands the outbound queue's receiving end to the writer. Returns `None`
    /// after the first call.
    pub(crate) fn take_outbound(&self) -> Option<Receiver<Message>> {
        lock(&self.pending).take()
    }

    /// Returns `true` once [`Client::stop`] has run.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Shuts the stream down and closes the outbound queue.
    ///
    /// Returns `false` when the client was already stopped.
    pub fn stop(&self) -> bool {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return false;
        }
        // The peer may already be gone; shutdown errors carry no information.
        let _ = self.stream.shutdown(Shutdown::Both);
        lock(&self.outbound).take();
        true
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poison| poison.into_inner())
}
