use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::migration::auth::MIN_SECRET_BYTES;

/// Environment variable overriding [`MigrationConfig::connect_timeout`], in milliseconds.
pub const CONNECT_TIMEOUT_ENV: &str = "MIGRATENET_CONNECT_TIMEOUT_MS";

/// Environment variable overriding [`MigrationConfig::dial_timeout`], in milliseconds.
pub const DIAL_TIMEOUT_ENV: &str = "MIGRATENET_DIAL_TIMEOUT_MS";

/// How long a session waits for its peers to bind every required channel.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub const DEFAULT_LIVE_MIGRATION_TOOL: &str = "criu";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    connect_timeout: Duration,
    dial_timeout: Duration,
    live_migration_tool: String,
    secret_bytes: usize,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            dial_timeout: Duration::from_secs(10),
            live_migration_tool: DEFAULT_LIVE_MIGRATION_TOOL.to_string(),
            secret_bytes: 32,
        }
    }
}

impl MigrationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, with the timeouts taken from the environment when set to a
    /// positive number of milliseconds.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(timeout) = millis_from_env(CONNECT_TIMEOUT_ENV) {
            config.connect_timeout = timeout;
        }
        if let Some(timeout) = millis_from_env(DIAL_TIMEOUT_ENV) {
            config.dial_timeout = timeout;
        }
        config
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    pub fn with_live_migration_tool<S: Into<String>>(mut self, tool: S) -> Self {
        self.live_migration_tool = tool.into();
        self
    }

    pub fn with_secret_bytes(mut self, bytes: usize) -> Self {
        self.secret_bytes = bytes.max(MIN_SECRET_BYTES);
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn dial_timeout(&self) -> Duration {
        self.dial_timeout
    }

    pub fn live_migration_tool(&self) -> &str {
        &self.live_migration_tool
    }

    /// Never below [`MIN_SECRET_BYTES`], even for deserialized configs.
    pub fn secret_bytes(&self) -> usize {
        self.secret_bytes.max(MIN_SECRET_BYTES)
    }
}

fn millis_from_env(key: &str) -> Option<Duration> {
    let raw = env::var(key).ok()?;
    parse_millis(&raw)
}

fn parse_millis(raw: &str) -> Option<Duration> {
    let value = raw.trim().parse::<u64>().ok()?;
    (value > 0).then(|| Duration::from_millis(value))
}
