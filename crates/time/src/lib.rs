//! IPPAN NTP Pool Time Source
//!
//! Acquires network time from an NTP pool by fanning out several
//! concurrent SNTP queries to one resolved address and keeping the
//! median-round-trip reading.
//!
//! # Features
//! - Single resolution per request, shared by all attempts
//! - Five concurrent attempts, each under its own timeout
//! - Slow readings (round trip above the configured slack) discarded
//! - Deterministic upper-median selection, no averaging of readings
//! - One aggregated error when no attempt is usable
//!
//! The SNTP wire exchange itself is supplied by the caller through
//! [`TimeQuery`].

pub mod arbiter;
pub mod config;
pub mod errors;
pub mod query;
pub mod resolver;
pub mod source;
pub mod types;

pub use arbiter::{arbitrate, filter_slow, median_reading, select};
pub use config::NtpSourceConfig;
pub use errors::{ConfigError, QueryError, ResolutionError, Result, TimeSourceError};
pub use query::{fan_out, TimeQuery, REQUEST_BATCH_SIZE};
pub use resolver::{PoolResolver, SystemResolver};
pub use source::{NtpTimeSource, TimeSource};
pub use types::{NtpReading, QueryOutcome, TimeSourceConfig, TimeSyncInfo};
