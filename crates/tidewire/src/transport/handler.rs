//! Connection handling abstraction for the listener.

use std::net::TcpStream;

/// Handles accepted socket connections.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Takes ownership of a single accepted connection. Implementations should
    /// avoid panicking.
    fn handle(&self, stream: TcpStream);
}
