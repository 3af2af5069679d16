//! Socket-level plumbing: OS tuning for accepted connections, the default
//! frame reader and writer, and the TCP listener.

mod errors;
mod frame;
mod handler;
mod listener;
mod socket;
#[cfg(test)]
mod test_utils;

pub use self::errors::{FrameError, ListenerError, SocketError};
pub use self::frame::{read_message, read_raw_frame, write_frame};
pub use self::handler::ConnectionHandler;
pub use self::listener::{ListenerHandle, SocketListener};
pub use self::socket::configure;
#[cfg(test)]
pub(crate) use self::test_utils::CountingHandler;

pub(crate) const TRANSPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
