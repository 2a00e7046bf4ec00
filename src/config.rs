//! Runtime configuration loaded from the environment.
//!
//! Every knob is optional; unset or unparsable values fall back to the
//! defaults below. `.env` is read by `main` before this runs.

use std::time::Duration;

const DEFAULT_PORT: u16 = 4000;
/// Inactivity window after which a board is reaped (48h).
const DEFAULT_BOARD_IDLE_TTL_SECS: u64 = 48 * 60 * 60;
const DEFAULT_REAPER_INTERVAL_SECS: u64 = 60 * 60;
const DEFAULT_WS_CLIENT_QUEUE_CAPACITY: usize = 256;
const DEFAULT_HUB_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub board_idle_ttl: Duration,
    pub reaper_interval: Duration,
    /// Outbound event queue per websocket connection.
    pub client_queue_capacity: usize,
    /// Inbound command queue of the hub actor.
    pub hub_queue_capacity: usize,
    /// Allowed CORS origins. Empty allows any origin.
    pub cors_allowed_origins: Vec<String>,
}

impl Config {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            port: env_parse("PORT", DEFAULT_PORT),
            board_idle_ttl: Duration::from_secs(env_parse("BOARD_IDLE_TTL_SECS", DEFAULT_BOARD_IDLE_TTL_SECS)),
            reaper_interval: Duration::from_secs(env_parse("REAPER_INTERVAL_SECS", DEFAULT_REAPER_INTERVAL_SECS).max(1)),
            client_queue_capacity: env_parse("WS_CLIENT_QUEUE_CAPACITY", DEFAULT_WS_CLIENT_QUEUE_CAPACITY).max(1),
            hub_queue_capacity: env_parse("HUB_QUEUE_CAPACITY", DEFAULT_HUB_QUEUE_CAPACITY).max(1),
            cors_allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                .map(|raw| parse_origins(&raw))
                .unwrap_or_default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            board_idle_ttl: Duration::from_secs(DEFAULT_BOARD_IDLE_TTL_SECS),
            reaper_interval: Duration::from_secs(DEFAULT_REAPER_INTERVAL_SECS),
            client_queue_capacity: DEFAULT_WS_CLIENT_QUEUE_CAPACITY,
            hub_queue_capacity: DEFAULT_HUB_QUEUE_CAPACITY,
            cors_allowed_origins: Vec::new(),
        }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Split a comma-separated origin list, dropping blanks.
fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
