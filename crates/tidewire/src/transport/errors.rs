//! Error types for socket, framing, and listener operations.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use crate::protocol::ProtocolError;

/// Errors surfaced while binding or running the socket listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to resolve TCP address {address}: {source}")]
    Resolve {
        address: String,
        #[source]
        source: io::Error,
    },
    #[error("no TCP addresses resolved for {address}")]
    ResolveEmpty { address: String },
    #[error("failed to bind TCP listener at {addr}: {source}")]
    BindTcp {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("failed to enable non-blocking listener: {source}")]
    NonBlocking {
        #[source]
        source: io::Error,
    },
    #[error("listener thread panicked")]
    ThreadPanic,
}

/// A socket option could not be applied to an accepted connection.
#[derive(Debug, Error)]
#[error("failed to set socket option {option}: {source}")]
pub struct SocketError {
    /// Name of the option that failed.
    pub option: &'static str,
    /// Underlying OS error.
    #[source]
    pub source: io::Error,
}

impl SocketError {
    pub(crate) fn option(option: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| Self { option, source }
    }
}

/// Per-connection failures while reading or writing a frame.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Applying the read or write deadline failed.
    #[error("failed to apply socket deadline: {source}")]
    Deadline {
        #[source]
        source: io::Error,
    },
    /// The fixed header could not be read in full.
    #[error("failed to read frame header: {source}")]
    ReadHeader {
        #[source]
        source: io::Error,
    },
    /// The header announced a frame above the configured limit.
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    PacketTooLarge { len: usize, max: usize },
    /// The body could not be read in full.
    #[error("failed to read {len}-byte frame body: {source}")]
    ReadBody {
        len: usize,
        #[source]
        source: io::Error,
    },
    /// The frame could not be decoded or opened.
    #[error("failed to decode frame: {0}")]
    Decode(#[from] ProtocolError),
    /// The write call failed.
    #[error("failed to write frame: {source}")]
    Write {
        #[source]
        source: io::Error,
    },
    /// The write call transferred fewer bytes than the frame holds.
    #[error("short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },
}

impl FrameError {
    /// Returns `true` when the error came from an expired deadline.
    pub fn is_timeout(&self) -> bool {
        let source = match self {
            Self::ReadHeader { source } | Self::ReadBody { source, .. } | Self::Write { source } => {
                source
            }
            _ => return false,
        };
        matches!(
            source.kind(),
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
        )
    }
}
