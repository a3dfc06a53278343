//! Error types for the probing engine.
//!
//! Only [`LeaseError`] on acquisition is fatal to a run. Everything below it is
//! contained inside the probe that produced it and turned into a verdict.

use std::time::Duration;

use thiserror::Error;

/// Configuration rejected by [`crate::ProbeConfig::validate`]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Concurrency must be at least 1")]
    ZeroConcurrency,

    #[error(
        "Request timeout out of range: {0} ms (allowed: {min}..={max} ms)",
        min = crate::config::MIN_REQUEST_TIMEOUT_MS,
        max = crate::config::MAX_REQUEST_TIMEOUT_MS
    )]
    RequestTimeout(u64),

    #[error("No probe targets configured")]
    NoTargets,

    #[error("Duplicate capability flag `{0}`")]
    DuplicateFlag(String),

    #[error("Invalid target `{target}`: {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("Invalid fleet endpoint: {0}")]
    InvalidFleet(String),
}

/// A single HTTP attempt that never produced a response
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Network error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest does not expose the configured duration on the error
            TransportError::Other(format!("timeout: {err}"))
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else if err.is_builder() {
            TransportError::InvalidUrl(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

/// Failure to acquire (or release) a fleet lease
#[derive(Debug, Error)]
pub enum LeaseError {
    #[error("Fleet control request failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Fleet control returned HTTP {0}")]
    Status(u16),

    #[error("Malformed fleet response: {0}")]
    Malformed(String),

    #[error("Fleet response is missing `{0}`")]
    MissingField(&'static str),

    #[error("Fleet returned {got} ports for {expected} nodes")]
    PortCountMismatch { expected: usize, got: usize },
}

/// Raised by a [`crate::NodeConverter`] for a node it cannot translate
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Node is not an object")]
    NotAnObject,

    #[error("Node is missing field `{0}`")]
    MissingField(&'static str),

    #[error("Node field `{field}` is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// File-backed cache store failures
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache file is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}
