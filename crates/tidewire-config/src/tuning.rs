//! Resolved runtime parameters handed to the engine.
//!
//! [`Config`](crate::Config) stores raw, serialisable values (milliseconds,
//! signed linger seconds). The types here carry the same settings in the form
//! the socket layer consumes, so the conversion rules live in one place.

use std::time::Duration;

/// Per-connection socket options and frame limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketTuning {
    /// Disable Nagle's algorithm.
    pub no_delay: bool,
    /// Enable TCP keepalive probes.
    pub keep_alive: bool,
    /// Idle time before the first keepalive probe. Ignored unless
    /// `keep_alive` is set.
    pub keepalive_time: Duration,
    /// Kernel receive buffer size in bytes.
    pub recv_buf_len: usize,
    /// Kernel send buffer size in bytes.
    pub send_buf_len: usize,
    /// Linger timeout; `None` leaves linger disabled.
    pub linger: Option<Duration>,
    /// Largest accepted frame, header included, in bytes.
    pub max_pack_len: usize,
    /// Read deadline per frame read; `None` blocks indefinitely.
    pub recv_timeout: Option<Duration>,
    /// Write deadline per frame write; `None` blocks indefinitely.
    pub send_timeout: Option<Duration>,
    /// Capacity of each connection's outbound queue.
    pub send_queue_size: usize,
}

/// Everything the engine needs at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Socket options and frame limits.
    pub tuning: SocketTuning,
    /// Exclusive upper bound for user command codes.
    pub user_command_max: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        crate::Config::default().engine_settings()
    }
}

/// Converts a millisecond setting into an optional deadline. Zero disables the
/// deadline.
pub(crate) fn deadline_from_millis(millis: u64) -> Option<Duration> {
    (millis > 0).then(|| Duration::from_millis(millis))
}

/// Converts signed linger seconds into the socket representation.
pub(crate) fn linger_from_seconds(seconds: i32) -> Option<Duration> {
    u64::try_from(seconds).ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, None)]
    #[case(1_500, Some(Duration::from_millis(1_500)))]
    fn zero_millis_disables_deadline(#[case] millis: u64, #[case] expected: Option<Duration>) {
        assert_eq!(deadline_from_millis(millis), expected);
    }

    #[rstest]
    #[case(-1, None)]
    #[case(-30, None)]
    #[case(0, Some(Duration::ZERO))]
    #[case(5, Some(Duration::from_secs(5)))]
    fn negative_linger_disables_linger(#[case] seconds: i32, #[case] expected: Option<Duration>) {
        assert_eq!(linger_from_seconds(seconds), expected);
    }
}
