//! Engine configuration (spec.md §6).
//!
//! Process-level bootstrap — CLI parsing, config file loading, TLS
//! termination — is explicitly out of scope for this crate; callers build
//! a `ServerConfig` however their binary prefers and hand it to
//! [`crate::server::Server`].

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::TcpStream;

use crate::handshake::Handshake;

/// The connection engine only speaks plain TCP directly; TLS termination
/// is process-level bootstrap and out of scope (spec.md §1).
pub type ConnReader = ReadHalf<TcpStream>;
pub type ConnWriter = WriteHalf<TcpStream>;

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_INPUT_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_MAX_PLAIN_DATA_SIZE: u64 = 16 * 1024 * 1024;
pub const DEFAULT_DOWNLOAD_SPEED: u32 = 32 * 1024 * 1024;

/// Engine-level configuration shared by every accepted connection.
#[derive(Clone)]
pub struct ServerConfig {
    /// `None` disables the idle timer entirely.
    pub idle_timeout: Option<Duration>,
    /// `None` disables the per-`input()` await timeout.
    pub input_timeout: Option<Duration>,
    /// `None` skips the handshake stage (connections go straight to the
    /// message loop).
    pub handshake: Option<Arc<dyn Handshake<ConnReader, ConnWriter>>>,
    /// Payloads above this size are spooled to a temp file rather than
    /// held in memory.
    pub max_plain_data_size: u64,
    /// Default outbound rate limit in bytes/sec; `0` means unlimited.
    pub default_download_speed: u32,
    /// `Some(interval)` runs a proactive ping loop alongside the read loop,
    /// emitting `0xFF` frames at `interval` (kept below `idle_timeout`).
    /// `None` disables proactive pings; the reactive echo still applies.
    pub ping_interval: Option<Duration>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("idle_timeout", &self.idle_timeout)
            .field("input_timeout", &self.input_timeout)
            .field(
                "handshake",
                &self.handshake.as_ref().map(|_| "<dyn Handshake>"),
            )
            .field("max_plain_data_size", &self.max_plain_data_size)
            .field("default_download_speed", &self.default_download_speed)
            .field("ping_interval", &self.ping_interval)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
            input_timeout: Some(DEFAULT_INPUT_TIMEOUT),
            handshake: None,
            max_plain_data_size: DEFAULT_MAX_PLAIN_DATA_SIZE,
            default_download_speed: DEFAULT_DOWNLOAD_SPEED,
            ping_interval: None,
        }
    }
}
