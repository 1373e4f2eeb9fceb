//! Versioned cache stores and the store manager.
//!
//! A [`Cache`] maps request identity (full URL, query included) to a stored
//! response. [`CacheStorage`] holds all stores by name; exactly one store is
//! "current" at any time, named `<app-name>-cache-<version>`. The
//! [`CacheStoreManager`] owns the current name and performs best-effort
//! lifecycle operations over the storage.

use std::sync::Arc;

use hashbrown::HashMap;
use refbox_net::{Request, Response};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// A cached request/response pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Request URL.
    pub url: String,

    /// Request method.
    pub method: String,

    /// Response status.
    pub status: u16,

    /// Response headers.
    pub headers: HashMap<String, String>,

    /// Response body.
    pub body: Vec<u8>,

    /// Cached at timestamp (ms since epoch).
    pub cached_at: u64,
}

impl CacheEntry {
    /// Snapshot a network response for storage.
    pub fn from_response(request: &Request, response: &Response) -> Self {
        let mut headers = HashMap::new();
        for (name, value) in response.headers.iter() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.as_str().to_string(), v.to_string());
            }
        }
        Self {
            url: request.cache_key(),
            method: request.method.to_string(),
            status: response.status.as_u16(),
            headers,
            body: response.body().to_vec(),
            cached_at: now_millis(),
        }
    }
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A single named cache store.
#[derive(Debug, Default)]
pub struct Cache {
    /// Cache name.
    pub name: String,

    /// Cached entries keyed by request identity.
    entries: HashMap<String, CacheEntry>,
}

impl Cache {
    /// Create a new cache.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: HashMap::new(),
        }
    }

    /// Match a request identity exactly.
    pub fn match_request(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Store an entry, overwriting any prior entry for the same identity.
    pub fn put(&mut self, key: &str, entry: CacheEntry) {
        self.entries.insert(key.to_string(), entry);
    }

    /// Delete an entry.
    pub fn delete(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// All stored request identities.
    pub fn keys(&self) -> Vec<&str> {
        self.entries.keys().map(|s| s.as_str()).collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// All cache stores, by name.
#[derive(Debug, Default)]
pub struct CacheStorage {
    caches: HashMap<String, Cache>,
}

impl CacheStorage {
    /// Create new cache storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a cache (creates if it doesn't exist).
    pub fn open(&mut self, name: &str) -> &mut Cache {
        self.caches
            .entry(name.to_string())
            .or_insert_with(|| Cache::new(name))
    }

    /// Check if a cache exists.
    pub fn has(&self, name: &str) -> bool {
        self.caches.contains_key(name)
    }

    /// Read access to a cache by name.
    pub fn get(&self, name: &str) -> Option<&Cache> {
        self.caches.get(name)
    }

    /// Delete a cache.
    pub fn delete(&mut self, name: &str) -> bool {
        self.caches.remove(name).is_some()
    }

    /// All cache store names.
    pub fn keys(&self) -> Vec<String> {
        self.caches.keys().cloned().collect()
    }
}

/// Outcome of a purge pass. Failures never abort the purge; they are
/// recorded here and the caller decides whether to log or ignore them.
#[derive(Debug, Clone, Default)]
pub struct PurgeReport {
    /// Names of stores that were deleted.
    pub deleted: Vec<String>,

    /// Names of stores that could not be deleted and were skipped.
    pub skipped: Vec<String>,
}

impl PurgeReport {
    /// Whether every targeted store was deleted.
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Manages the current versioned store inside shared [`CacheStorage`].
///
/// The current store name is explicit configuration handed in at
/// construction, not module state, so two managers with different version
/// tags can coexist over the same storage in tests.
#[derive(Clone)]
pub struct CacheStoreManager {
    storage: Arc<RwLock<CacheStorage>>,
    current_name: String,
}

impl CacheStoreManager {
    /// Create a manager for the store named by the current version tag.
    pub fn new(current_name: String, storage: Arc<RwLock<CacheStorage>>) -> Self {
        Self {
            storage,
            current_name,
        }
    }

    /// Name of the current store.
    pub fn current_name(&self) -> &str {
        &self.current_name
    }

    /// Handle to the shared storage this manager operates over.
    pub fn storage(&self) -> Arc<RwLock<CacheStorage>> {
        Arc::clone(&self.storage)
    }

    /// Open (creating if absent) the current store.
    pub async fn open_current(&self) {
        let mut storage = self.storage.write().await;
        storage.open(&self.current_name);
        debug!(cache = %self.current_name, "Cache store opened");
    }

    /// Look up a request identity in the current store.
    pub async fn match_current(&self, key: &str) -> Option<CacheEntry> {
        let storage = self.storage.read().await;
        storage
            .caches
            .get(&self.current_name)
            .and_then(|cache| cache.match_request(key))
            .cloned()
    }

    /// Store an entry in the current store, creating the store if needed.
    pub async fn put_current(&self, key: &str, entry: CacheEntry) {
        let mut storage = self.storage.write().await;
        storage.open(&self.current_name).put(key, entry);
    }

    /// Delete every store whose name does not match the current version tag.
    ///
    /// Best-effort: a store that fails to delete is skipped, never aborts
    /// the pass. Idempotent — running it twice leaves exactly the current
    /// store (if it exists) both times.
    pub async fn purge_stale(&self) -> PurgeReport {
        let mut report = PurgeReport::default();
        let mut storage = self.storage.write().await;
        let names = storage.keys();
        for name in names {
            if name == self.current_name {
                continue;
            }
            if storage.delete(&name) {
                info!(cache = %name, "Deleted stale cache store");
                report.deleted.push(name);
            } else {
                warn!(cache = %name, "Could not delete stale cache store, skipping");
                report.skipped.push(name);
            }
        }
        report
    }

    /// Delete every store regardless of version. Used for the explicit
    /// user-triggered refresh.
    pub async fn purge_all(&self) -> PurgeReport {
        let mut report = PurgeReport::default();
        let mut storage = self.storage.write().await;
        let names = storage.keys();
        for name in names {
            if storage.delete(&name) {
                info!(cache = %name, "Deleted cache store");
                report.deleted.push(name);
            } else {
                warn!(cache = %name, "Could not delete cache store, skipping");
                report.skipped.push(name);
            }
        }
        report
    }

    /// Names of all stores currently present.
    pub async fn store_names(&self) -> Vec<String> {
        self.storage.read().await.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(current: &str) -> CacheStoreManager {
        CacheStoreManager::new(
            current.to_string(),
            Arc::new(RwLock::new(CacheStorage::new())),
        )
    }

    fn entry(url: &str, body: &[u8]) -> CacheEntry {
        CacheEntry {
            url: url.to_string(),
            method: "GET".to_string(),
            status: 200,
            headers: HashMap::new(),
            body: body.to_vec(),
            cached_at: 0,
        }
    }

    #[test]
    fn test_cache_put_overwrites() {
        let mut cache = Cache::new("refbox-cache-v1");
        cache.put("https://a/x", entry("https://a/x", b"one"));
        cache.put("https://a/x", entry("https://a/x", b"two"));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.match_request("https://a/x").unwrap().body, b"two");
    }

    #[test]
    fn test_cache_delete() {
        let mut cache = Cache::new("refbox-cache-v1");
        cache.put("https://a/x", entry("https://a/x", b"one"));

        assert!(cache.delete("https://a/x"));
        assert!(!cache.delete("https://a/x"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_storage_open_and_delete() {
        let mut storage = CacheStorage::new();
        assert!(!storage.has("v1"));

        storage.open("v1");
        assert!(storage.has("v1"));

        assert!(storage.delete("v1"));
        assert!(!storage.has("v1"));
    }

    #[tokio::test]
    async fn test_open_current_creates_store() {
        let manager = manager("app-cache-v2");
        manager.open_current().await;
        assert_eq!(manager.store_names().await, vec!["app-cache-v2"]);
    }

    #[tokio::test]
    async fn test_purge_stale_keeps_only_current() {
        let manager = manager("app-cache-v2");
        {
            let mut storage = manager.storage.write().await;
            storage.open("app-cache-v1");
            storage.open("app-cache-v2");
        }

        let report = manager.purge_stale().await;
        assert_eq!(report.deleted, vec!["app-cache-v1".to_string()]);
        assert!(report.is_clean());
        assert_eq!(manager.store_names().await, vec!["app-cache-v2"]);
    }

    #[tokio::test]
    async fn test_purge_stale_idempotent() {
        let manager = manager("app-cache-v2");
        {
            let mut storage = manager.storage.write().await;
            storage.open("app-cache-v1");
            storage.open("app-cache-v2");
        }

        manager.purge_stale().await;
        let second = manager.purge_stale().await;

        assert!(second.deleted.is_empty());
        assert_eq!(manager.store_names().await, vec!["app-cache-v2"]);
    }

    #[tokio::test]
    async fn test_purge_all_deletes_everything() {
        let manager = manager("app-cache-v2");
        {
            let mut storage = manager.storage.write().await;
            storage.open("app-cache-v1");
            storage.open("app-cache-v2");
        }

        let report = manager.purge_all().await;
        assert_eq!(report.deleted.len(), 2);
        assert!(manager.store_names().await.is_empty());
    }

    #[tokio::test]
    async fn test_match_and_put_current() {
        let manager = manager("refbox-cache-v1");
        assert!(manager.match_current("https://a/x").await.is_none());

        manager
            .put_current("https://a/x", entry("https://a/x", b"body"))
            .await;
        let hit = manager.match_current("https://a/x").await.unwrap();
        assert_eq!(hit.body, b"body");
    }
}
