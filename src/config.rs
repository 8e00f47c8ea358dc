//! Server configuration
//!
//! Defaults match the original deployment; every knob can be overridden
//! through the environment.

use std::env;
use std::time::Duration;

/// Default TCP port
pub const DEFAULT_PORT: u16 = 12345;

/// Files at or below this size are sent inline as a single encoded line
pub const DEFAULT_INLINE_THRESHOLD: u64 = 200 * 1024;

/// Sessions idle longer than this are reaped
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Interval between reaper sweeps
pub const DEFAULT_REAP_INTERVAL: Duration = Duration::from_secs(60);

/// Outbound queue capacity per session (frames)
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Runtime knobs for one server instance
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port to listen on
    pub port: u16,
    /// Inline-vs-stream file transfer threshold in bytes
    pub inline_threshold: u64,
    /// Inactivity timeout before a session is reaped
    pub idle_timeout: Duration,
    /// How often the reaper sweeps
    pub reap_interval: Duration,
    /// Per-session outbound queue capacity; a full queue disconnects
    /// the slow consumer
    pub queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            inline_threshold: DEFAULT_INLINE_THRESHOLD,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            reap_interval: DEFAULT_REAP_INTERVAL,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl ServerConfig {
    /// Build a config from the environment, falling back to defaults.
    ///
    /// Recognized variables: `RELAY_INLINE_THRESHOLD` (bytes),
    /// `RELAY_IDLE_TIMEOUT_SECS`, `RELAY_REAP_INTERVAL_SECS`,
    /// `RELAY_QUEUE_CAPACITY`. Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = parse_env::<u64>("RELAY_INLINE_THRESHOLD") {
            config.inline_threshold = v;
        }
        if let Some(v) = parse_env::<u64>("RELAY_IDLE_TIMEOUT_SECS") {
            config.idle_timeout = Duration::from_secs(v);
        }
        if let Some(v) = parse_env::<u64>("RELAY_REAP_INTERVAL_SECS") {
            config.reap_interval = Duration::from_secs(v);
        }
        if let Some(v) = parse_env::<usize>("RELAY_QUEUE_CAPACITY") {
            // A zero-capacity channel cannot be constructed
            config.queue_capacity = v.max(1);
        }

        config
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}
