//! JSON file backed cache store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use super::{CacheEntry, CacheStore};
use crate::error::CacheError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct StoredEntry {
    #[serde(flatten)]
    entry: CacheEntry,
    /// Unix seconds
    written_at: i64,
}

/// Cache entries kept in memory and persisted to a JSON file between runs.
///
/// Entries older than `ttl` are ignored on read and dropped on persist.
pub struct JsonFileCache {
    path: PathBuf,
    ttl: Option<Duration>,
    entries: RwLock<HashMap<String, StoredEntry>>,
}

impl JsonFileCache {
    /// Load the cache file, starting empty if it does not exist yet
    pub async fn load(path: impl AsRef<Path>, ttl: Option<Duration>) -> Result<Self, CacheError> {
        let path = path.as_ref().to_path_buf();

        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(raw) if raw.trim().is_empty() => HashMap::new(),
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        debug!("Loaded {} cache entries from {}", entries.len(), path.display());
        Ok(Self { path, ttl, entries: RwLock::new(entries) })
    }

    fn is_fresh(&self, stored: &StoredEntry, now: i64) -> bool {
        match self.ttl {
            Some(ttl) => now.saturating_sub(stored.written_at) < ttl.as_secs() as i64,
            None => true,
        }
    }

    /// Write all fresh entries back to the file
    pub async fn persist(&self) -> Result<(), CacheError> {
        let now = Utc::now().timestamp();
        let fresh: HashMap<String, StoredEntry> = self
            .entries
            .read()
            .await
            .iter()
            .filter(|(_, stored)| self.is_fresh(stored, now))
            .map(|(key, stored)| (key.clone(), *stored))
            .collect();

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, serde_json::to_string_pretty(&fresh)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!("Persisted {} cache entries to {}", fresh.len(), self.path.display());
        Ok(())
    }
}

#[async_trait]
impl CacheStore for JsonFileCache {
    async fn get(&self, key: &str) -> Option<CacheEntry> {
        let now = Utc::now().timestamp();
        self.entries
            .read()
            .await
            .get(key)
            .filter(|stored| self.is_fresh(stored, now))
            .map(|stored| stored.entry)
    }

    async fn set(&self, key: &str, entry: CacheEntry) {
        let stored = StoredEntry { entry, written_at: Utc::now().timestamp() };
        self.entries.write().await.insert(key.to_string(), stored);
    }
}
