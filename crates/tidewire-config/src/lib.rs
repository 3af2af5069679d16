//! Layered configuration for the tidewire socket server.
//!
//! Values resolve from built-in defaults, an optional configuration file,
//! `TIDEWIRE_*` environment variables, and command-line flags, in increasing
//! order of precedence. The loader is derived with `ortho_config`; the
//! [`Config::engine_settings`] accessor converts the raw values into the
//! [`EngineSettings`] consumed by the engine.

mod defaults;
mod logging;
mod tuning;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_LISTEN_ADDRESS, DEFAULT_LOG_FILTER, DEFAULT_SEND_QUEUE_SIZE, DEFAULT_SOCK_KEEP_ALIVE,
    DEFAULT_SOCK_KEEPALIVE_TIME_MS, DEFAULT_SOCK_LINGER_SECONDS, DEFAULT_SOCK_MAX_PACK_LEN,
    DEFAULT_SOCK_NO_DELAY, DEFAULT_SOCK_RECV_BLOCK_TIME_MS, DEFAULT_SOCK_RECV_BUF_LEN,
    DEFAULT_SOCK_SEND_BLOCK_TIME_MS, DEFAULT_SOCK_SEND_BUF_LEN, DEFAULT_USER_COMMAND_MAX,
    default_listen_address, default_log_filter, default_log_filter_string, default_log_format,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use tuning::{EngineSettings, SocketTuning};

use tuning::{deadline_from_millis, linger_from_seconds};

/// Server configuration resolved from every supported layer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "TIDEWIRE")]
pub struct Config {
    /// Address the listener binds, as `host:port`.
    #[ortho_config(default = defaults::default_listen_address())]
    pub listen_address: String,
    /// Disable Nagle's algorithm on accepted sockets.
    #[ortho_config(default = DEFAULT_SOCK_NO_DELAY)]
    pub sock_no_delay: bool,
    /// Enable TCP keepalive probes on accepted sockets.
    #[ortho_config(default = DEFAULT_SOCK_KEEP_ALIVE)]
    pub sock_keep_alive: bool,
    /// Idle time before the first keepalive probe, in milliseconds.
    #[ortho_config(default = DEFAULT_SOCK_KEEPALIVE_TIME_MS)]
    pub sock_keepalive_time_ms: u64,
    /// Kernel receive buffer size in bytes.
    #[ortho_config(default = DEFAULT_SOCK_RECV_BUF_LEN)]
    pub sock_recv_buf_len: usize,
    /// Kernel send buffer size in bytes.
    #[ortho_config(default = DEFAULT_SOCK_SEND_BUF_LEN)]
    pub sock_send_buf_len: usize,
    /// Linger seconds; negative values leave linger disabled.
    #[ortho_config(default = DEFAULT_SOCK_LINGER_SECONDS)]
    pub sock_linger_seconds: i32,
    /// Largest accepted frame, header included, in bytes.
    #[ortho_config(default = DEFAULT_SOCK_MAX_PACK_LEN)]
    pub sock_max_pack_len: usize,
    /// Read deadline per frame, in milliseconds. Zero disables it.
    #[ortho_config(default = DEFAULT_SOCK_RECV_BLOCK_TIME_MS)]
    pub sock_recv_block_time_ms: u64,
    /// Write deadline per frame, in milliseconds. Zero disables it.
    #[ortho_config(default = DEFAULT_SOCK_SEND_BLOCK_TIME_MS)]
    pub sock_send_block_time_ms: u64,
    /// Capacity of each connection's outbound queue.
    #[ortho_config(default = DEFAULT_SEND_QUEUE_SIZE)]
    pub send_queue_size: usize,
    /// Exclusive upper bound for user command codes.
    #[ortho_config(default = DEFAULT_USER_COMMAND_MAX)]
    pub user_command_max: u32,
    /// Tracing filter expression.
    #[ortho_config(default = defaults::default_log_filter_string())]
    pub log_filter: String,
    /// Output format for structured logs.
    #[ortho_config(default = defaults::default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            sock_no_delay: DEFAULT_SOCK_NO_DELAY,
            sock_keep_alive: DEFAULT_SOCK_KEEP_ALIVE,
            sock_keepalive_time_ms: DEFAULT_SOCK_KEEPALIVE_TIME_MS,
            sock_recv_buf_len: DEFAULT_SOCK_RECV_BUF_LEN,
            sock_send_buf_len: DEFAULT_SOCK_SEND_BUF_LEN,
            sock_linger_seconds: DEFAULT_SOCK_LINGER_SECONDS,
            sock_max_pack_len: DEFAULT_SOCK_MAX_PACK_LEN,
            sock_recv_block_time_ms: DEFAULT_SOCK_RECV_BLOCK_TIME_MS,
            sock_send_block_time_ms: DEFAULT_SOCK_SEND_BLOCK_TIME_MS,
            send_queue_size: DEFAULT_SEND_QUEUE_SIZE,
            user_command_max: DEFAULT_USER_COMMAND_MAX,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Address the listener binds.
    pub fn listen_address(&self) -> &str {
        &self.listen_address
    }

    /// Tracing filter expression.
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Output format for structured logs.
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Socket options and frame limits in the form the socket layer uses.
    pub fn socket_tuning(&self) -> SocketTuning {
        SocketTuning {
            no_delay: self.sock_no_delay,
            keep_alive: self.sock_keep_alive,
            keepalive_time: std::time::Duration::from_millis(self.sock_keepalive_time_ms),
            recv_buf_len: self.sock_recv_buf_len,
            send_buf_len: self.sock_send_buf_len,
            linger: linger_from_seconds(self.sock_linger_seconds),
            max_pack_len: self.sock_max_pack_len,
            recv_timeout: deadline_from_millis(self.sock_recv_block_time_ms),
            send_timeout: deadline_from_millis(self.sock_send_block_time_ms),
            send_queue_size: self.send_queue_size,
        }
    }

    /// Settings the engine is constructed with.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            tuning: self.socket_tuning(),
            user_command_max: self.user_command_max,
        }
    }
}
