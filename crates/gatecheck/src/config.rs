//! Engine configuration.
//!
//! A single immutable structure with defaulted fields. It is deserialized from
//! whatever the host uses (the CLI reads TOML) and validated once when the
//! engine is built.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;
use crate::probe::ProbeTarget;

pub const MIN_REQUEST_TIMEOUT_MS: u64 = 100;
pub const MAX_REQUEST_TIMEOUT_MS: u64 = 300_000;

/// Connection details of the external fleet process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// Host of the control API; leased endpoints live on the same host
    pub host: String,
    pub port: u16,
    pub protocol: String,
    /// Sent as `Authorization` on control calls when non-empty
    pub authorization: String,
    pub start_timeout_ms: u64,
    pub stop_timeout_ms: u64,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 9876,
            protocol: "http".into(),
            authorization: String::new(),
            start_timeout_ms: 3000,
            stop_timeout_ms: 2000,
        }
    }
}

impl FleetConfig {
    /// Base URL of the control API, e.g. `http://127.0.0.1:9876`
    pub fn api_base(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }

    /// Local proxy endpoint for a leased port
    pub fn endpoint(&self, port: u16) -> String {
        format!("http://{}:{}", self.host, port)
    }
}

/// How the delay before each retry grows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryBackoff {
    #[default]
    Fixed,
    /// `retry_delay × attempt`
    Linear,
}

/// Where a passing target's tag goes in the node's display name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagPosition {
    #[default]
    Prefix,
    Suffix,
}

/// Options for one probing run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub fleet: FleetConfig,
    pub request_timeout_ms: u64,
    pub retries: u32,
    pub retry_delay_ms: u64,
    pub retry_backoff: RetryBackoff,
    pub concurrency: usize,
    pub start_delay_ms: u64,
    pub per_node_allowance_ms: u64,
    pub max_redirects: u32,
    pub cache: bool,
    pub disable_failed_cache: bool,
    pub tag_position: TagPosition,
    pub targets: Vec<ProbeTarget>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            fleet: FleetConfig::default(),
            request_timeout_ms: 5000,
            retries: 1,
            retry_delay_ms: 1000,
            retry_backoff: RetryBackoff::Fixed,
            concurrency: 10,
            start_delay_ms: 3000,
            per_node_allowance_ms: 10_000,
            max_redirects: 5,
            cache: false,
            disable_failed_cache: false,
            tag_position: TagPosition::Prefix,
            targets: Vec::new(),
        }
    }
}

impl ProbeConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn start_delay(&self) -> Duration {
        Duration::from_millis(self.start_delay_ms)
    }

    /// Delay awaited before retry number `attempt` (1-based)
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let base = Duration::from_millis(self.retry_delay_ms);
        match self.retry_backoff {
            RetryBackoff::Fixed => base,
            RetryBackoff::Linear => base * attempt.max(1),
        }
    }

    /// Lease duration for `node_count` nodes.
    ///
    /// A loose upper bound on the run: `start_delay + per_node_allowance × n`.
    pub fn lease_duration(&self, node_count: usize) -> Duration {
        let per_node = self.per_node_allowance_ms.saturating_mul(node_count as u64);
        Duration::from_millis(self.start_delay_ms.saturating_add(per_node))
    }

    /// Validate the configuration once, before any run
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }

        if !(MIN_REQUEST_TIMEOUT_MS..=MAX_REQUEST_TIMEOUT_MS).contains(&self.request_timeout_ms) {
            return Err(ConfigError::RequestTimeout(self.request_timeout_ms));
        }

        Url::parse(&self.fleet.api_base())
            .map_err(|e| ConfigError::InvalidFleet(e.to_string()))?;

        if self.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }

        let mut flags = HashSet::new();
        for target in &self.targets {
            target.validate()?;
            if !flags.insert(target.flag.as_str()) {
                return Err(ConfigError::DuplicateFlag(target.flag.clone()));
            }
        }

        Ok(())
    }
}
