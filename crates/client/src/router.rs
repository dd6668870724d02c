//! Request router: serves every intercepted request with the strategy the
//! route table picks for its host.
//!
//! ### Strategies
//! - **Network only**: forward, never touch the cache store, surface failures as-is.
//! - **Stale-while-revalidate**: cached copy immediately, refresh in a spawned task.
//!   On a miss, fetch, duplicate the body, store one copy and return the other.
//! - **Cache first**: cached copy without refresh; fill on a miss.
//! - **Network first**: fetch and fill; fall back to the cached copy on failure.
//!
//! Entries are always stored under the identity of the original request, never
//! one derived from the response, so redirects cannot split an entry in two.
//! Bodies larger than the entry limit are served but never stored.

use std::sync::Arc;

use tokio::task::JoinHandle;

use pwa_relay_core::{CacheStorage, Error, NamedCache, RequestKey, Snapshot, Strategy};

use crate::fetch::{Network, Request, Response};
use crate::route::RouteTable;

/// Result of a background refresh. Never reaches the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A fresh copy replaced the cached one.
    Stored,
    /// The network answered with a status that is not stored.
    Skipped(u16),
    /// The refresh failed; the cached copy stays.
    Failed(String),
}

/// A routed response, plus the refresh task it started, if any.
#[derive(Debug)]
pub struct Routed {
    pub response: Response,
    pub strategy: Strategy,
    pub refresh: Option<JoinHandle<RefreshOutcome>>,
}

/// Largest body written to the cache store unless configured otherwise.
pub const DEFAULT_MAX_ENTRY_BYTES: usize = 5 * 1024 * 1024;

/// Routes intercepted requests between the network and the current cache.
pub struct Router {
    cache: NamedCache,
    network: Arc<dyn Network>,
    routes: RouteTable,
    max_entry_bytes: usize,
}

impl Router {
    pub fn new(
        cache_version: impl Into<String>, storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>,
        routes: RouteTable,
    ) -> Self {
        Self {
            cache: NamedCache::new(storage, cache_version),
            network,
            routes,
            max_entry_bytes: DEFAULT_MAX_ENTRY_BYTES,
        }
    }

    pub fn with_max_entry_bytes(mut self, max_entry_bytes: usize) -> Self {
        self.max_entry_bytes = max_entry_bytes;
        self
    }

    /// Serve a request, detaching any background refresh.
    pub async fn handle(&self, request: Request) -> Result<Response, Error> {
        self.route(request).await.map(|routed| routed.response)
    }

    /// Serve a request and hand back the background refresh, if one was started.
    pub async fn route(&self, request: Request) -> Result<Routed, Error> {
        let strategy = self.routes.decide(&request.url);
        tracing::debug!(url = %request.url, method = %request.method, ?strategy, "routing request");

        let (response, refresh) = match strategy {
            Strategy::NetworkOnly => (self.network.fetch(&request).await?, None),
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(request).await?,
            Strategy::CacheFirst => (self.cache_first(request).await?, None),
            Strategy::NetworkFirst => (self.network_first(request).await?, None),
        };

        Ok(Routed { response, strategy, refresh })
    }

    async fn stale_while_revalidate(
        &self, request: Request,
    ) -> Result<(Response, Option<JoinHandle<RefreshOutcome>>), Error> {
        let key = request.key();
        if let Some(cached) = self.lookup(&key).await {
            let refresh =
                tokio::spawn(revalidate(self.cache.clone(), self.network.clone(), self.max_entry_bytes, request));
            return Ok((cached, Some(refresh)));
        }

        Ok((self.fetch_and_fill(&request).await?, None))
    }

    async fn cache_first(&self, request: Request) -> Result<Response, Error> {
        match self.lookup(&request.key()).await {
            Some(cached) => Ok(cached),
            None => self.fetch_and_fill(&request).await,
        }
    }

    async fn network_first(&self, request: Request) -> Result<Response, Error> {
        match self.fetch_and_fill(&request).await {
            Ok(response) => Ok(response),
            Err(Error::Network(reason)) => match self.lookup(&request.key()).await {
                Some(cached) => {
                    tracing::debug!(url = %request.url, %reason, "network failed, serving cached copy");
                    Ok(cached)
                }
                None => Err(Error::Network(reason)),
            },
            Err(e) => Err(e),
        }
    }

    /// Cached response for `key`, if any. A failing store counts as a miss.
    async fn lookup(&self, key: &RequestKey) -> Option<Response> {
        let snapshot = match self.cache.match_request(key).await {
            Ok(snapshot) => snapshot?,
            Err(e) => {
                tracing::warn!(cache = %self.cache.name(), request = %key, error = %e, "cache lookup failed");
                return None;
            }
        };

        match Response::from_snapshot(snapshot) {
            Ok(response) => Some(response),
            Err(e) => {
                tracing::warn!(request = %key, error = %e, "discarding unreadable cache entry");
                None
            }
        }
    }

    /// Fetch, and store a duplicate of a storable response before returning it.
    async fn fetch_and_fill(&self, request: &Request) -> Result<Response, Error> {
        let response = self.network.fetch(request).await?;
        let key = request.key();
        if !key.is_cacheable() || !response.is_storable() {
            return Ok(response);
        }
        if exceeds(response.len_hint(), self.max_entry_bytes) {
            tracing::debug!(request = %key, len = ?response.len_hint(), "too large to store, serving only");
            return Ok(response);
        }

        let (returned, stored) = response.tee().await?;
        if let Err(e) = store(&self.cache, &key, stored, self.max_entry_bytes).await {
            tracing::warn!(cache = %self.cache.name(), request = %key, error = %e, "failed to write cache entry");
        }
        Ok(returned)
    }
}

fn exceeds(len: Option<u64>, max_entry_bytes: usize) -> bool {
    len.is_some_and(|len| len > max_entry_bytes as u64)
}

/// Drain `response` into a snapshot and write it under `key`.
///
/// Fails with `EntryTooLarge` without writing when the body is over `max_entry_bytes`.
pub(crate) async fn store(
    cache: &NamedCache, key: &RequestKey, response: Response, max_entry_bytes: usize,
) -> Result<(), Error> {
    if exceeds(response.len_hint(), max_entry_bytes) {
        return Err(Error::EntryTooLarge(format!("{key} declares more than {max_entry_bytes} bytes")));
    }

    let snapshot: Snapshot = response.into_snapshot().await?;
    if snapshot.body.len() > max_entry_bytes {
        return Err(Error::EntryTooLarge(format!(
            "{key} has {} bytes, limit is {max_entry_bytes}",
            snapshot.body.len()
        )));
    }
    cache.put(key, &snapshot).await
}

async fn revalidate(
    cache: NamedCache, network: Arc<dyn Network>, max_entry_bytes: usize, request: Request,
) -> RefreshOutcome {
    let key = request.key();
    let outcome = match network.fetch(&request).await {
        Ok(response) if response.is_storable() => {
            match store(&cache, &key, response, max_entry_bytes).await {
                Ok(()) => RefreshOutcome::Stored,
                Err(e) => RefreshOutcome::Failed(e.to_string()),
            }
        }
        Ok(response) => RefreshOutcome::Skipped(response.status.as_u16()),
        Err(e) => RefreshOutcome::Failed(e.to_string()),
    };

    tracing::debug!(request = %key, ?outcome, "background refresh finished");
    outcome
}
