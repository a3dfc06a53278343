//! Result cache.
//!
//! Verdicts are memoized per (node fingerprint, target) in a
//! caller-supplied [`CacheStore`]. Expiry is the store's business.

mod file;

pub use file::JsonFileCache;

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

/// Cached outcome of one (node, target) probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency: Option<u64>,
}

impl CacheEntry {
    pub fn success(latency: Option<u64>) -> Self {
        Self { ok: true, latency }
    }

    pub fn failure() -> Self {
        Self { ok: false, latency: None }
    }
}

/// Key-value store for cache entries
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<CacheEntry>;
    async fn set(&self, key: &str, entry: CacheEntry);
}

/// In-process cache store
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Option<CacheEntry> {
        self.entries.read().await.get(key).copied()
    }

    async fn set(&self, key: &str, entry: CacheEntry) {
        self.entries.write().await.insert(key.to_string(), entry);
    }
}

/// Identity and cosmetic keys that never invalidate a cache entry
fn is_ignored_key(key: &str) -> bool {
    key.starts_with('_')
        || ["name", "collectionName", "subName", "id"].iter().any(|ignored| key.eq_ignore_ascii_case(ignored))
}

/// Cache key for probing the target `flag` at `url` through a node with this
/// wire form.
///
/// Renaming a node or touching its `_` metadata keeps the key stable; any
/// change to its connection parameters produces a new one. Targets sharing a
/// URL keep separate entries since their rule tables differ.
pub fn fingerprint(flag: &str, url: &str, wire: &Map<String, Value>) -> String {
    let stable: BTreeMap<&str, Value> = wire
        .iter()
        .filter(|(key, _)| !is_ignored_key(key))
        .map(|(key, value)| (key.as_str(), canonical(value)))
        .collect();

    // BTreeMap serializes in key order
    let encoded = serde_json::to_string(&stable).unwrap_or_default();
    let digest = Sha256::digest(encoded.as_bytes());

    format!("probe:{}:{}:{}", flag, url, hex::encode(digest))
}

/// Rebuild nested objects with sorted keys
fn canonical(value: &Value) -> Value {
    match value {
        Value::Object(object) => {
            let sorted: BTreeMap<&String, Value> = object.iter().map(|(k, v)| (k, canonical(v))).collect();
            Value::Object(sorted.into_iter().map(|(k, v)| (k.clone(), v)).collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        other => other.clone(),
    }
}
