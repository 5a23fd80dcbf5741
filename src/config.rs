//! Server configuration
//!
//! The bind address comes from the first command line argument, tuning
//! knobs from environment variables. Anything missing falls back to the
//! defaults below.

use std::env;
use std::time::Duration;

use tracing::warn;

/// Default server address
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Per-user mailbox capacity
pub const DEFAULT_MAILBOX_CAPACITY: usize = 100;

/// Pending broadcast requests before handlers start waiting
pub const DEFAULT_BROADCAST_CAPACITY: usize = 100;

/// Pause between successive fan-outs
pub const DEFAULT_FANOUT_DELAY: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: String,
    pub mailbox_capacity: usize,
    pub broadcast_capacity: usize,
    pub fanout_delay: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
            fanout_delay: DEFAULT_FANOUT_DELAY,
        }
    }
}

impl ServerConfig {
    /// Build from process arguments and environment
    ///
    /// - `argv[1]`: bind address
    /// - `CHAT_MAILBOX_CAPACITY`, `CHAT_BROADCAST_CAPACITY`, `CHAT_FANOUT_DELAY_MS`
    pub fn from_args(args: impl Iterator<Item = String>) -> Self {
        Self::from_sources(args, |key| env::var(key).ok())
    }

    /// Same as [`ServerConfig::from_args`] with an explicit variable lookup
    ///
    /// Capacities of zero are ignored; a bounded channel needs at least one slot.
    pub fn from_sources(
        mut args: impl Iterator<Item = String>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            addr: args.nth(1).unwrap_or(defaults.addr),
            mailbox_capacity: env_number(&lookup, "CHAT_MAILBOX_CAPACITY")
                .filter(|&n| n > 0)
                .unwrap_or(defaults.mailbox_capacity),
            broadcast_capacity: env_number(&lookup, "CHAT_BROADCAST_CAPACITY")
                .filter(|&n| n > 0)
                .unwrap_or(defaults.broadcast_capacity),
            fanout_delay: env_number(&lookup, "CHAT_FANOUT_DELAY_MS")
                .map(|ms| Duration::from_millis(ms as u64))
                .unwrap_or(defaults.fanout_delay),
        }
    }
}

fn env_number(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<usize> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(n) => Some(n),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a number", key, raw);
            None
        }
    }
}
