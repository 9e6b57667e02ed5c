//! Types shared by the resolver, fan-out engine and arbiter.

use serde::{Deserialize, Serialize};

use crate::errors::QueryError;

/// A single timed reading returned by the query adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NtpReading {
    /// Network time reported by the server, in epoch milliseconds
    pub ntp_time_ms: i64,
    /// Local monotonic uptime at which `ntp_time_ms` was valid
    pub uptime_reference_ms: i64,
    /// Measured request/response latency
    pub round_trip_time_ms: i64,
}

/// Outcome of one attempt in a fan-out batch.
#[derive(Debug)]
pub enum QueryOutcome {
    /// The attempt completed and produced a timed reading
    Success(NtpReading),
    /// The attempt produced no usable reading
    Failure {
        /// Underlying error, absent for slack violations
        cause: Option<QueryError>,
        message: String,
    },
}

impl QueryOutcome {
    /// Wrap an attempt-local error, keeping it as the failure cause.
    pub fn from_error(err: QueryError) -> Self {
        let mut message = err.to_string();
        if message.is_empty() {
            message = "NTP request failed".to_string();
        }
        QueryOutcome::Failure {
            cause: Some(err),
            message,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, QueryOutcome::Success(_))
    }

    /// Reading carried by a success, if any.
    pub fn reading(&self) -> Option<&NtpReading> {
        match self {
            QueryOutcome::Success(reading) => Some(reading),
            QueryOutcome::Failure { .. } => None,
        }
    }

    /// Failure message, if this is a failure.
    pub fn message(&self) -> Option<&str> {
        match self {
            QueryOutcome::Success(_) => None,
            QueryOutcome::Failure { message, .. } => Some(message),
        }
    }
}

impl From<Result<NtpReading, QueryError>> for QueryOutcome {
    fn from(result: Result<NtpReading, QueryError>) -> Self {
        match result {
            Ok(reading) => QueryOutcome::Success(reading),
            Err(err) => QueryOutcome::from_error(err),
        }
    }
}

/// Accepted time reading paired with the device uptime at acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSyncInfo {
    /// Network time in epoch milliseconds
    pub request_time: i64,
    /// Monotonic uptime in milliseconds at which `request_time` was valid
    pub request_uptime: i64,
}

impl TimeSyncInfo {
    /// Project the synced time forward to the given uptime.
    pub fn project(&self, uptime_now_ms: i64) -> i64 {
        self.request_time
            .saturating_add(uptime_now_ms.saturating_sub(self.request_uptime))
    }
}

impl From<&NtpReading> for TimeSyncInfo {
    fn from(reading: &NtpReading) -> Self {
        Self {
            request_time: reading.ntp_time_ms,
            request_uptime: reading.uptime_reference_ms,
        }
    }
}

/// Identity of a time source within the surrounding framework.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSourceConfig {
    pub id: String,
    pub priority: i32,
}

impl TimeSourceConfig {
    pub fn new(id: impl Into<String>, priority: i32) -> Self {
        Self {
            id: id.into(),
            priority,
        }
    }
}
