//! The cache store seam.
//!
//! Lifecycle and routing code only ever talk to a `dyn CacheStorage`, so the
//! SQLite store can be swapped for an instrumented one in tests.

use std::sync::Arc;

use async_trait::async_trait;

use super::entries::{RequestKey, Snapshot};
use crate::Error;

/// A set of named caches mapping request identity to response snapshots.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the named cache if it does not exist yet.
    async fn open(&self, name: &str) -> Result<(), Error>;

    /// Look up a request in one cache. Non-GET requests never match.
    async fn match_request(&self, name: &str, key: &RequestKey) -> Result<Option<Snapshot>, Error>;

    /// Store a snapshot, replacing any existing entry for the same identity.
    async fn put(&self, name: &str, key: &RequestKey, snapshot: &Snapshot) -> Result<(), Error>;

    /// Names of all caches, oldest first.
    async fn keys(&self) -> Result<Vec<String>, Error>;

    /// Delete a cache and all of its entries. Returns whether it existed.
    async fn delete(&self, name: &str) -> Result<bool, Error>;
}

/// Handle to a single cache, bound to its name.
#[derive(Clone)]
pub struct NamedCache {
    storage: Arc<dyn CacheStorage>,
    name: String,
}

impl NamedCache {
    /// Bind to `name` without creating it. `put` creates it on first write.
    pub fn new(storage: Arc<dyn CacheStorage>, name: impl Into<String>) -> Self {
        Self { storage, name: name.into() }
    }

    /// Open (creating if absent) the cache called `name`.
    pub async fn open(storage: Arc<dyn CacheStorage>, name: impl Into<String>) -> Result<Self, Error> {
        let cache = Self::new(storage, name);
        cache.storage.open(&cache.name).await?;
        Ok(cache)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn match_request(&self, key: &RequestKey) -> Result<Option<Snapshot>, Error> {
        self.storage.match_request(&self.name, key).await
    }

    pub async fn put(&self, key: &RequestKey, snapshot: &Snapshot) -> Result<(), Error> {
        self.storage.put(&self.name, key, snapshot).await
    }
}

impl std::fmt::Debug for NamedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedCache").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CacheDb;

    #[tokio::test]
    async fn test_named_cache_round_trip() {
        let storage: Arc<dyn CacheStorage> = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let cache = NamedCache::open(storage.clone(), "gochat-v6").await.unwrap();
        assert_eq!(cache.name(), "gochat-v6");

        let key = RequestKey::get("https://example.com/app.js");
        let snapshot = Snapshot::new("https://example.com/app.js", 200, b"console.log(1)".to_vec());
        cache.put(&key, &snapshot).await.unwrap();

        let found = cache.match_request(&key).await.unwrap().unwrap();
        assert_eq!(found.status, 200);
        assert_eq!(found.body, b"console.log(1)");
        assert_eq!(storage.keys().await.unwrap(), vec!["gochat-v6"]);
    }

    #[tokio::test]
    async fn test_bound_cache_is_created_on_first_put() {
        let storage: Arc<dyn CacheStorage> = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let cache = NamedCache::new(storage.clone(), "gochat-v6");
        assert!(storage.keys().await.unwrap().is_empty());

        let key = RequestKey::get("https://example.com/");
        assert!(cache.match_request(&key).await.unwrap().is_none());
        cache.put(&key, &Snapshot::new("https://example.com/", 200, b"hi".to_vec())).await.unwrap();
        assert_eq!(storage.keys().await.unwrap(), vec!["gochat-v6"]);
    }
}
