//! NTP pool time source: resolve -> fan-out -> filter -> select.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::arbiter::arbitrate;
use crate::config::NtpSourceConfig;
use crate::errors::{ConfigError, Result};
use crate::query::{fan_out, TimeQuery, REQUEST_BATCH_SIZE};
use crate::resolver::{PoolResolver, SystemResolver};
use crate::types::{TimeSourceConfig, TimeSyncInfo};

/// A source of network time registered with the node's time framework.
#[async_trait]
pub trait TimeSource: Send + Sync {
    fn config(&self) -> &TimeSourceConfig;

    fn id(&self) -> &str {
        &self.config().id
    }

    fn priority(&self) -> i32 {
        self.config().priority
    }

    /// Acquire one independent time reading.
    async fn request_time(&self) -> Result<TimeSyncInfo>;
}

/// Time source querying an NTP pool.
///
/// Each [`TimeSource::request_time`] call resolves the pool once, sends
/// [`REQUEST_BATCH_SIZE`] concurrent queries to that address and returns the
/// median-round-trip reading among those within `max_round_trip_ms`.
/// A resolution failure is returned as-is, before any query is sent.
pub struct NtpTimeSource {
    config: TimeSourceConfig,
    ntp: NtpSourceConfig,
    resolver: Arc<dyn PoolResolver>,
    query: Arc<dyn TimeQuery>,
}

impl NtpTimeSource {
    /// Create a source; `ntp` is validated before it is accepted.
    pub fn new(
        config: TimeSourceConfig,
        ntp: NtpSourceConfig,
        resolver: Arc<dyn PoolResolver>,
        query: Arc<dyn TimeQuery>,
    ) -> std::result::Result<Self, ConfigError> {
        ntp.validate()?;
        Ok(Self {
            config,
            ntp,
            resolver,
            query,
        })
    }

    /// Create a source that resolves the pool through the system resolver.
    pub fn with_system_resolver(
        config: TimeSourceConfig,
        ntp: NtpSourceConfig,
        query: Arc<dyn TimeQuery>,
    ) -> std::result::Result<Self, ConfigError> {
        Self::new(config, ntp, Arc::new(SystemResolver), query)
    }

    pub fn ntp_config(&self) -> &NtpSourceConfig {
        &self.ntp
    }
}

impl std::fmt::Debug for NtpTimeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NtpTimeSource")
            .field("config", &self.config)
            .field("ntp", &self.ntp)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TimeSource for NtpTimeSource {
    fn config(&self) -> &TimeSourceConfig {
        &self.config
    }

    async fn request_time(&self) -> Result<TimeSyncInfo> {
        debug!("[{}] Resolving NTP pool {}", self.config.id, self.ntp.ntp_pool);
        // Resolution errors are returned directly, never aggregated.
        let addr = self.resolver.resolve(&self.ntp.ntp_pool).await?;

        let outcomes = fan_out(
            self.query.clone(),
            addr,
            self.ntp.port,
            self.ntp.timeout(),
            REQUEST_BATCH_SIZE,
        )
        .await;

        arbitrate(outcomes, self.ntp.max_round_trip_ms)
    }
}
