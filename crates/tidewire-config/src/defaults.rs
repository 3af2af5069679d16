use crate::logging::LogFormat;

/// Address the server listens on when nothing else is configured.
pub const DEFAULT_LISTEN_ADDRESS: &str = "127.0.0.1:9880";

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Whether Nagle's algorithm is disabled on accepted sockets.
pub const DEFAULT_SOCK_NO_DELAY: bool = true;

/// Whether TCP keepalive probes are enabled on accepted sockets.
pub const DEFAULT_SOCK_KEEP_ALIVE: bool = false;

/// Idle time before the first keepalive probe, in milliseconds.
pub const DEFAULT_SOCK_KEEPALIVE_TIME_MS: u64 = 60_000;

/// Kernel receive buffer size in bytes.
pub const DEFAULT_SOCK_RECV_BUF_LEN: usize = 8 * 1024;

/// Kernel send buffer size in bytes.
pub const DEFAULT_SOCK_SEND_BUF_LEN: usize = 8 * 1024;

/// Linger seconds; any negative value leaves linger disabled.
pub const DEFAULT_SOCK_LINGER_SECONDS: i32 = -1;

/// Largest accepted frame, header included, in bytes.
pub const DEFAULT_SOCK_MAX_PACK_LEN: usize = 1024 * 1024;

/// Read deadline applied before every frame read, in milliseconds.
pub const DEFAULT_SOCK_RECV_BLOCK_TIME_MS: u64 = 65_000;

/// Write deadline applied before every frame write, in milliseconds.
pub const DEFAULT_SOCK_SEND_BLOCK_TIME_MS: u64 = 5_000;

/// Capacity of each connection's outbound queue.
pub const DEFAULT_SEND_QUEUE_SIZE: usize = 512;

/// Exclusive upper bound for user command codes.
pub const DEFAULT_USER_COMMAND_MAX: u32 = 0x0100_0000;

/// Default log filter expression used by the binaries.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Owned listen address used where allocation is required.
pub fn default_listen_address() -> String {
    DEFAULT_LISTEN_ADDRESS.to_owned()
}
