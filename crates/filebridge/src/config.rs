//! Bridge configuration.
//!
//! `BridgeConfig::default()` honors environment overrides:
//! - `FILEBRIDGE_COMMANDS_DIR`, `FILEBRIDGE_RESPONSES_DIR`
//! - `FILEBRIDGE_POLL_INTERVAL`, `FILEBRIDGE_TIMEOUT` (seconds, fractional allowed)

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_COMMANDS_DIR: &str = "AICommands";
pub const DEFAULT_RESPONSES_DIR: &str = "AIResponses";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Shortest poll interval a client will use. Smaller values are raised to it.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    pub commands_dir: PathBuf,
    pub responses_dir: PathBuf,
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            commands_dir: env_path("FILEBRIDGE_COMMANDS_DIR")
                .unwrap_or_else(|| PathBuf::from(DEFAULT_COMMANDS_DIR)),
            responses_dir: env_path("FILEBRIDGE_RESPONSES_DIR")
                .unwrap_or_else(|| PathBuf::from(DEFAULT_RESPONSES_DIR)),
            poll_interval: env_seconds("FILEBRIDGE_POLL_INTERVAL")
                .filter(|d| !d.is_zero())
                .map_or(DEFAULT_POLL_INTERVAL, |d| d.max(MIN_POLL_INTERVAL)),
            timeout: env_seconds("FILEBRIDGE_TIMEOUT").unwrap_or(DEFAULT_TIMEOUT),
        }
    }
}

impl BridgeConfig {
    /// Config for the given directories with built-in timing defaults.
    ///
    /// Unlike `default()`, ignores the environment.
    pub fn new(commands_dir: impl Into<PathBuf>, responses_dir: impl Into<PathBuf>) -> Self {
        Self {
            commands_dir: commands_dir.into(),
            responses_dir: responses_dir.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn env_seconds(key: &str) -> Option<Duration> {
    std::env::var(key).ok().and_then(|s| parse_seconds(&s))
}

/// Parse a non-negative, finite number of seconds.
pub fn parse_seconds(s: &str) -> Option<Duration> {
    s.trim()
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}
