use serde::{Deserialize, Serialize};
use url::Url;

use crate::classifier::{Rule, StrongVerification};
use crate::error::ConfigError;

/// A named capability to test every node for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeTarget {
    /// Human readable name used in logs and reports
    pub name: String,

    /// Capability flag written to the node as `_<flag>` and `_<flag>_latency`
    pub flag: String,

    /// Text inserted into the display name of passing nodes
    #[serde(default)]
    pub tag: String,

    pub url: String,

    #[serde(default = "default_method")]
    pub method: String,

    #[serde(default, with = "header_map")]
    pub headers: Vec<(String, String)>,

    /// Follow 3xx responses up to `max_redirects` hops
    #[serde(default)]
    pub follow_redirects: bool,

    /// Statuses retried like a transport failure
    #[serde(default)]
    pub retry_statuses: Vec<u16>,

    /// Ordered rule table, first match wins
    #[serde(default)]
    pub rules: Vec<Rule>,

    #[serde(default)]
    pub verification: Option<StrongVerification>,
}

fn default_method() -> String {
    "GET".into()
}

impl ProbeTarget {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidTarget { target: self.name.clone(), reason };

        if self.flag.is_empty() {
            return Err(invalid("empty capability flag".into()));
        }

        validate_http_url(&self.url).map_err(invalid)?;

        if let Some(verification) = &self.verification {
            if verification.steps.is_empty() {
                return Err(invalid("strong verification without steps".into()));
            }
            for step in &verification.steps {
                validate_http_url(&step.url).map_err(invalid)?;
            }
        }

        Ok(())
    }
}

fn validate_http_url(url: &str) -> Result<(), String> {
    let parsed = Url::parse(url).map_err(|e| format!("invalid URL {url}: {e}"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("unsupported URL scheme: {other}")),
    }
}

/// Headers as a TOML/JSON table, keyed by header name
mod header_map {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(headers: &[(String, String)], serializer: S) -> Result<S::Ok, S::Error> {
        let map: BTreeMap<&str, &str> = headers.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        map.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<(String, String)>, D::Error> {
        let map = BTreeMap::<String, String>::deserialize(deserializer)?;
        Ok(map.into_iter().collect())
    }
}

/// Raw result of one HTTP attempt (after redirects, if followed)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Observation {
    /// HTTP status, `0` when the attempt failed at the transport level
    pub status: u16,
    pub latency_ms: u64,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub error: Option<String>,
}

impl Observation {
    pub fn transport_failure(error: String, latency_ms: u64) -> Self {
        Self { status: 0, latency_ms, error: Some(error), ..Default::default() }
    }

    pub fn is_transport_failure(&self) -> bool {
        self.error.is_some()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Kind of conclusion reached for one (node, target) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictKind {
    Pass,
    Fail,
    Blocked,
    StrongPass,
    Indeterminate,
    NetworkError,
}

impl std::fmt::Display for VerdictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerdictKind::Pass => write!(f, "pass"),
            VerdictKind::Fail => write!(f, "fail"),
            VerdictKind::Blocked => write!(f, "blocked"),
            VerdictKind::StrongPass => write!(f, "strong_pass"),
            VerdictKind::Indeterminate => write!(f, "indeterminate"),
            VerdictKind::NetworkError => write!(f, "network_error"),
        }
    }
}

/// Classifier output for one (node, target) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub kind: VerdictKind,
    pub detail: String,
    pub latency_ms: Option<u64>,
}

impl Verdict {
    pub fn new(kind: VerdictKind, detail: impl Into<String>, latency_ms: Option<u64>) -> Self {
        Self { kind, detail: detail.into(), latency_ms }
    }

    /// Whether the node gets tagged for this target
    pub fn is_pass(&self) -> bool {
        matches!(self.kind, VerdictKind::Pass | VerdictKind::StrongPass)
    }
}
