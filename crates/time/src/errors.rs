//! Error types for the NTP pool time source

use thiserror::Error;

/// Failure of a single query attempt. Always recovered into a
/// [`crate::QueryOutcome::Failure`] by the fan-out engine.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("NTP request timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("NTP request I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed NTP reply: {0}")]
    Protocol(String),

    #[error("NTP request aborted: {0}")]
    Aborted(String),

    #[error("{0}")]
    Other(String),
}

/// Failure to turn the pool hostname into an address.
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("Failed to resolve {host}: {source}")]
    Lookup {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("No address found for {host}")]
    NoAddress { host: String },
}

/// Errors surfaced by [`crate::TimeSource::request_time`].
#[derive(Error, Debug)]
pub enum TimeSourceError {
    /// Hostname lookup failed before any query was sent
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// No attempt yielded an acceptable reading
    #[error("{message}")]
    AllRequestsFailed {
        message: String,
        #[source]
        cause: Option<QueryError>,
    },
}

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, TimeSourceError>;
