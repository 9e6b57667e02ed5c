//! Construction-time configuration of the NTP pool source.
//!
//! Values are fixed once handed to [`crate::NtpTimeSource`]; loading goes
//! defaults -> TOML file -> `IPPAN_NTP_*` environment overrides.

use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::ConfigError;

/// Public pool queried when none is configured.
pub const DEFAULT_NTP_POOL: &str = "pool.ntp.org";
/// Standard NTP port.
pub const DEFAULT_NTP_PORT: u16 = 123;
/// Round trips above this are discarded.
pub const DEFAULT_MAX_ROUND_TRIP_MS: u64 = 1_000;
/// Per-attempt timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NtpSourceConfig {
    /// Pool hostname resolved once per request
    pub ntp_pool: String,
    /// Port handed to the query adapter
    pub port: u16,
    /// Maximum accepted round trip
    pub max_round_trip_ms: u64,
    /// Timeout applied to each attempt independently
    pub timeout_ms: u64,
}

impl Default for NtpSourceConfig {
    fn default() -> Self {
        Self {
            ntp_pool: DEFAULT_NTP_POOL.to_string(),
            port: DEFAULT_NTP_PORT,
            max_round_trip_ms: DEFAULT_MAX_ROUND_TRIP_MS,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl NtpSourceConfig {
    pub fn with_pool(mut self, pool: impl Into<String>) -> Self {
        self.ntp_pool = pool.into();
        self
    }

    pub fn with_max_round_trip_ms(mut self, max_round_trip_ms: u64) -> Self {
        self.max_round_trip_ms = max_round_trip_ms;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file and apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path.as_ref())?;
        let mut config: Self = toml::from_str(&raw)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `IPPAN_NTP_*` overrides. Unparsable values are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(pool) = env::var("IPPAN_NTP_POOL") {
            if !pool.trim().is_empty() {
                self.ntp_pool = pool.trim().to_string();
            }
        }
        if let Some(port) = parse_env("IPPAN_NTP_PORT") {
            self.port = port;
        }
        if let Some(max_rtt) = parse_env("IPPAN_NTP_MAX_ROUND_TRIP_MS") {
            self.max_round_trip_ms = max_rtt;
        }
        if let Some(timeout) = parse_env("IPPAN_NTP_TIMEOUT_MS") {
            self.timeout_ms = timeout;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ntp_pool.trim().is_empty() {
            return Err(ConfigError::Invalid("ntp_pool must not be empty".into()));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeout_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring unparsable {}={:?}", key, raw);
            None
        }
    }
}
