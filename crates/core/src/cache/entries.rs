//! Cache entry CRUD operations.
//!
//! Provides the SQLite implementation of [`CacheStorage`]: named caches,
//! and request/response snapshots stored under them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::CacheDb;
use super::hash::compute_cache_key;
use super::storage::CacheStorage;
use crate::Error;

/// Identity of a cached request: method plus absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestKey {
    pub method: String,
    pub url: String,
}

impl RequestKey {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self { method: method.into(), url: url.into() }
    }

    /// Shorthand for a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    /// Only GET requests can be matched or stored.
    pub fn is_cacheable(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }

    pub fn hash(&self) -> String {
        compute_cache_key(&self.method, &self.url)
    }
}

impl std::fmt::Display for RequestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method.to_ascii_uppercase(), self.url)
    }
}

/// A stored response: everything needed to replay it to a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// URL the response was served from (after redirects).
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub stored_at: String,
}

impl Snapshot {
    /// A snapshot with no headers, stamped now.
    pub fn new(url: impl Into<String>, status: u16, body: Vec<u8>) -> Self {
        Self {
            url: url.into(),
            status,
            headers: Vec::new(),
            content_type: None,
            body,
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[async_trait]
impl CacheStorage for CacheDb {
    async fn open(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)",
                    params![name, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn match_request(&self, name: &str, key: &RequestKey) -> Result<Option<Snapshot>, Error> {
        if !key.is_cacheable() {
            return Ok(None);
        }

        let name = name.to_string();
        let hash = key.hash();
        self.conn
            .call(move |conn| -> Result<Option<Snapshot>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT url, status, headers_json, content_type, body, stored_at
                    FROM entries WHERE cache_name = ?1 AND key_hash = ?2",
                )?;

                let result = stmt.query_row(params![name, hash], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, u16>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Vec<u8>>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                });

                match result {
                    Ok((url, status, headers_json, content_type, body, stored_at)) => Ok(Some(Snapshot {
                        url,
                        status,
                        headers: serde_json::from_str(&headers_json)?,
                        content_type,
                        body,
                        stored_at,
                    })),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Uses UPSERT semantics on (cache, identity); the cache row is created
    /// if an activation removed it in the meantime.
    async fn put(&self, name: &str, key: &RequestKey, snapshot: &Snapshot) -> Result<(), Error> {
        if !key.is_cacheable() {
            return Err(Error::InvalidInput(format!("only GET requests can be cached, got {key}")));
        }

        let name = name.to_string();
        let hash = key.hash();
        let method = key.method.to_ascii_uppercase();
        let request_url = key.url.clone();
        let headers_json = serde_json::to_string(&snapshot.headers)?;
        let snapshot = snapshot.clone();
        let now = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)",
                    params![&name, &now],
                )?;
                tx.execute(
                    "INSERT INTO entries (
                    cache_name, key_hash, method, url, status,
                    headers_json, content_type, body, stored_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ON CONFLICT(cache_name, key_hash) DO UPDATE SET
                    method = excluded.method,
                    url = excluded.url,
                    status = excluded.status,
                    headers_json = excluded.headers_json,
                    content_type = excluded.content_type,
                    body = excluded.body,
                    stored_at = excluded.stored_at",
                    params![
                        &name,
                        &hash,
                        &method,
                        &request_url,
                        snapshot.status,
                        &headers_json,
                        &snapshot.content_type,
                        &snapshot.body,
                        &snapshot.stored_at,
                    ],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM caches ORDER BY rowid")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM caches WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }
}

impl CacheDb {
    /// Number of entries stored in a cache.
    pub async fn entry_count(&self, name: &str) -> Result<u64, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE cache_name = ?1", params![name], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Request URLs stored in a cache, sorted.
    pub async fn cached_urls(&self, name: &str) -> Result<Vec<String>, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM entries WHERE cache_name = ?1 ORDER BY url")?;
                let urls = stmt
                    .query_map(params![name], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_snapshot(url: &str, body: &str) -> Snapshot {
        Snapshot {
            url: url.to_string(),
            status: 200,
            headers: vec![("content-type".to_string(), "text/html".to_string())],
            content_type: Some("text/html".to_string()),
            body: body.as_bytes().to_vec(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    #[tokio::test]
    async fn test_put_and_match() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let key = RequestKey::get("https://example.com/index.html");
        let snapshot = make_test_snapshot("https://example.com/index.html", "<h1>hi</h1>");

        db.open("v1").await.unwrap();
        db.put("v1", &key, &snapshot).await.unwrap();

        let retrieved = db.match_request("v1", &key).await.unwrap().unwrap();
        assert_eq!(retrieved, snapshot);
    }

    #[tokio::test]
    async fn test_match_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open("v1").await.unwrap();
        let result = db.match_request("v1", &RequestKey::get("https://example.com/")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_match_is_scoped_to_cache() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let key = RequestKey::get("https://example.com/");
        db.put("v1", &key, &make_test_snapshot("https://example.com/", "old")).await.unwrap();

        assert!(db.match_request("v2", &key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let key = RequestKey::get("https://example.com/app.js");
        db.put("v1", &key, &make_test_snapshot("https://example.com/app.js", "one")).await.unwrap();
        db.put("v1", &key, &make_test_snapshot("https://example.com/app.js", "two")).await.unwrap();

        assert_eq!(db.entry_count("v1").await.unwrap(), 1);
        let retrieved = db.match_request("v1", &key).await.unwrap().unwrap();
        assert_eq!(retrieved.body, b"two");
    }

    #[tokio::test]
    async fn test_put_rejects_non_get() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let key = RequestKey::new("POST", "https://example.com/api");
        let result = db.put("v1", &key, &make_test_snapshot("https://example.com/api", "{}")).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert!(db.match_request("v1", &key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_keys_in_creation_order() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open("gochat-v1").await.unwrap();
        db.open("gochat-v3").await.unwrap();
        db.open("gochat-v2").await.unwrap();
        db.open("gochat-v1").await.unwrap();

        assert_eq!(db.keys().await.unwrap(), vec!["gochat-v1", "gochat-v3", "gochat-v2"]);
    }

    #[tokio::test]
    async fn test_delete_removes_entries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let key = RequestKey::get("https://example.com/");
        db.put("v1", &key, &make_test_snapshot("https://example.com/", "x")).await.unwrap();

        assert!(db.delete("v1").await.unwrap());
        assert!(!db.delete("v1").await.unwrap());
        assert!(db.keys().await.unwrap().is_empty());
        assert_eq!(db.entry_count("v1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cached_urls() {
        let db = CacheDb::open_in_memory().await.unwrap();
        for url in ["https://example.com/b", "https://example.com/a"] {
            db.put("v1", &RequestKey::get(url), &make_test_snapshot(url, "x")).await.unwrap();
        }
        assert_eq!(db.cached_urls("v1").await.unwrap(), vec!["https://example.com/a", "https://example.com/b"]);
    }

    #[test]
    fn test_request_key_display() {
        assert_eq!(RequestKey::new("get", "https://example.com/").to_string(), "GET https://example.com/");
    }
}
