//! Single-address query adapter and the concurrent fan-out engine.
//!
//! The engine launches [`REQUEST_BATCH_SIZE`] attempts against one resolved
//! address, each on its own task under its own timeout, and waits for all of
//! them. Attempt errors never escape: every attempt yields a
//! [`QueryOutcome`], in launch order. Cancelling the caller cancels the
//! attempts.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::debug;

use crate::errors::QueryError;
use crate::types::{NtpReading, QueryOutcome};

/// Number of attempts issued per time request.
pub const REQUEST_BATCH_SIZE: usize = 5;

/// Sends one timed SNTP request to `addr:port` and parses the reply.
#[async_trait]
pub trait TimeQuery: Send + Sync {
    async fn query_once(
        &self,
        addr: IpAddr,
        port: u16,
        timeout: Duration,
    ) -> Result<NtpReading, QueryError>;
}

/// Run one attempt under `attempt_timeout`.
async fn run_attempt(
    query: Arc<dyn TimeQuery>,
    addr: IpAddr,
    port: u16,
    attempt_timeout: Duration,
) -> QueryOutcome {
    let result = match timeout(attempt_timeout, query.query_once(addr, port, attempt_timeout)).await
    {
        Ok(result) => result,
        Err(_) => Err(QueryError::Timeout {
            timeout_ms: u64::try_from(attempt_timeout.as_millis()).unwrap_or(u64::MAX),
        }),
    };
    result.into()
}

/// Issue `attempts` concurrent queries against `addr` and collect every outcome.
///
/// Attempts live in a [`JoinSet`]; dropping the returned future aborts any
/// attempt still in flight.
pub async fn fan_out(
    query: Arc<dyn TimeQuery>,
    addr: IpAddr,
    port: u16,
    attempt_timeout: Duration,
    attempts: usize,
) -> Vec<QueryOutcome> {
    let mut in_flight = JoinSet::new();
    for index in 0..attempts {
        let query = query.clone();
        in_flight.spawn(async move {
            (index, run_attempt(query, addr, port, attempt_timeout).await)
        });
    }

    let mut slots: Vec<Option<QueryOutcome>> = (0..attempts).map(|_| None).collect();
    let mut aborted = Vec::new();
    while let Some(joined) = in_flight.join_next().await {
        match joined {
            Ok((index, outcome)) => slots[index] = Some(outcome),
            Err(err) => aborted.push(err.to_string()),
        }
    }

    // A panicked attempt never reports its index; it owns one of the empty slots.
    let mut aborted = aborted.into_iter();
    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            let outcome = slot.unwrap_or_else(|| {
                let reason = aborted
                    .next()
                    .unwrap_or_else(|| "attempt did not complete".to_string());
                QueryOutcome::from_error(QueryError::Aborted(reason))
            });
            if let Some(message) = outcome.message() {
                debug!("NTP attempt {} against {} failed: {}", index, addr, message);
            }
            outcome
        })
        .collect()
}
