//! OS-level tuning applied to freshly accepted connections.

use std::net::{Shutdown, TcpStream};

use socket2::{SockRef, TcpKeepalive};
use tidewire_config::SocketTuning;
use tracing::debug;

use super::{SocketError, TRANSPORT_TARGET};

/// Applies `tuning` to `stream`: no-delay, keepalive (and its idle time when
/// enabled), receive buffer, send buffer, linger.
///
/// The first failing option aborts the sequence; the stream is shut down and
/// the error returned.
pub fn configure(stream: &TcpStream, tuning: &SocketTuning) -> Result<(), SocketError> {
    let result = apply(stream, tuning);
    if let Err(error) = &result {
        debug!(
            target: TRANSPORT_TARGET,
            option = error.option,
            error = %error.source,
            "socket configuration failed"
        );
        // Best effort; the caller drops the stream either way.
        let _ = stream.shutdown(Shutdown::Both);
    }
    result
}

fn apply(stream: &TcpStream, tuning: &SocketTuning) -> Result<(), SocketError> {
    let socket = SockRef::from(stream);
    socket
        .set_nodelay(tuning.no_delay)
        .map_err(SocketError::option("nodelay"))?;
    socket
        .set_keepalive(tuning.keep_alive)
        .map_err(SocketError::option("keepalive"))?;
    if tuning.keep_alive {
        let keepalive = TcpKeepalive::new().with_time(tuning.keepalive_time);
        #[cfg(any(
            target_os = "android",
            target_os = "freebsd",
            target_os = "fuchsia",
            target_os = "illumos",
            target_os = "ios",
            target_os = "linux",
            target_os = "macos",
            target_os = "netbsd",
            windows,
        ))]
        let keepalive = keepalive.with_interval(tuning.keepalive_time);
        socket
            .set_tcp_keepalive(&keepalive)
            .map_err(SocketError::option("keepalive_time"))?;
    }
    socket
        .set_recv_buffer_size(tuning.recv_buf_len)
        .map_err(SocketError::option("recv_buffer_size"))?;
    socket
        .set_send_buffer_size(tuning.send_buf_len)
        .map_err(SocketError::option("send_buffer_size"))?;
    socket
        .set_linger(tuning.linger)
        .map_err(SocketError::option("linger"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::test_support::{loopback_pair, tuning};

    #[test]
    fn applies_requested_options() {
        let (server, _peer) = loopback_pair();
        let mut requested = tuning();
        requested.no_delay = true;
        requested.keep_alive = true;
        requested.keepalive_time = Duration::from_secs(30);
        requested.linger = Some(Duration::from_secs(2));

        configure(&server, &requested).expect("configure socket");

        let socket = SockRef::from(&server);
        assert!(socket.nodelay().expect("nodelay"));
        assert!(socket.keepalive().expect("keepalive"));
        assert_eq!(
            socket.linger().expect("linger"),
            Some(Duration::from_secs(2))
        );
    }

    #[test]
    fn disabled_linger_stays_disabled() {
        let (server, _peer) = loopback_pair();
        let mut requested = tuning();
        requested.linger = None;

        configure(&server, &requested).expect("configure socket");

        let socket = SockRef::from(&server);
        assert_eq!(socket.linger().expect("linger"), None);
        assert!(!socket.keepalive().expect("keepalive"));
    }
}
