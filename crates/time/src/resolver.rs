//! Pool hostname resolution.

use std::net::IpAddr;

use async_trait::async_trait;
use tracing::debug;

use crate::errors::ResolutionError;

/// Resolves a pool hostname to the single address every attempt queries.
#[async_trait]
pub trait PoolResolver: Send + Sync {
    async fn resolve(&self, host: &str) -> Result<IpAddr, ResolutionError>;
}

/// Resolver backed by the operating system via tokio's DNS lookup.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl PoolResolver for SystemResolver {
    async fn resolve(&self, host: &str) -> Result<IpAddr, ResolutionError> {
        // Literal addresses skip the lookup entirely.
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(ip);
        }

        let mut addrs = tokio::net::lookup_host((host, 0))
            .await
            .map_err(|source| ResolutionError::Lookup {
                host: host.to_string(),
                source,
            })?;

        let addr = addrs.next().ok_or_else(|| ResolutionError::NoAddress {
            host: host.to_string(),
        })?;
        debug!("Resolved {} to {}", host, addr.ip());
        Ok(addr.ip())
    }
}
