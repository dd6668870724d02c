//! Install and activation of one cache version.
//!
//! `registering → installed → activating → active`. There is no way back:
//! a new version is a new `Lifecycle`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use url::Url;

use pwa_relay_core::{AssetManifest, CacheStorage, Error, InstallPolicy, NamedCache};

use crate::clients::ClientViews;
use crate::fetch::{Network, Request, resolve};
use crate::router::{DEFAULT_MAX_ENTRY_BYTES, store};

/// Lifecycle state of this relay version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Registering,
    Installed,
    Activating,
    Active,
}

/// An asset that could not be populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetFailure {
    pub asset: String,
    pub reason: String,
}

/// What an install managed to cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReport {
    pub cache: String,
    pub cached: Vec<String>,
    pub failed: Vec<AssetFailure>,
}

/// Drives install and activation for the current cache version.
pub struct Lifecycle {
    cache_version: String,
    origin: Url,
    manifest: AssetManifest,
    policy: InstallPolicy,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    clients: Arc<dyn ClientViews>,
    max_entry_bytes: usize,
    state: RwLock<WorkerState>,
    skip_waiting: AtomicBool,
}

impl Lifecycle {
    pub fn new(
        cache_version: impl Into<String>, origin: Url, manifest: AssetManifest, policy: InstallPolicy,
        storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>, clients: Arc<dyn ClientViews>,
    ) -> Self {
        Self {
            cache_version: cache_version.into(),
            origin,
            manifest,
            policy,
            storage,
            network,
            clients,
            max_entry_bytes: DEFAULT_MAX_ENTRY_BYTES,
            state: RwLock::new(WorkerState::Registering),
            skip_waiting: AtomicBool::new(false),
        }
    }

    pub fn with_max_entry_bytes(mut self, max_entry_bytes: usize) -> Self {
        self.max_entry_bytes = max_entry_bytes;
        self
    }

    pub fn cache_version(&self) -> &str {
        &self.cache_version
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Whether install asked the host to activate without waiting.
    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// Populate the current cache from the asset manifest.
    ///
    /// Assets are fetched one after another. Under the permissive policy a
    /// failed asset is logged and skipped; under the strict policy the first
    /// failure aborts install and the state stays `Registering`.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        {
            let state = self.state.read().await;
            if *state != WorkerState::Registering {
                return Err(Error::InvalidState(format!("cannot install from {:?}", *state)));
            }
        }

        tracing::info!(cache = %self.cache_version, assets = self.manifest.len(), "installing");
        let cache = NamedCache::open(self.storage.clone(), self.cache_version.clone()).await?;
        let mut report = InstallReport { cache: self.cache_version.clone(), ..Default::default() };

        for asset in self.manifest.iter() {
            let asset = asset.to_string();
            let populated = match resolve(&self.origin, &asset) {
                Ok(url) => self.populate(&cache, url).await,
                Err(e) => Err(e.to_string()),
            };

            match populated {
                Ok(()) => report.cached.push(asset),
                Err(reason) => {
                    if self.policy == InstallPolicy::Strict {
                        return Err(Error::AssetFailed { url: asset, reason });
                    }
                    tracing::warn!(asset = %asset, %reason, "failed to cache asset, continuing");
                    report.failed.push(AssetFailure { asset, reason });
                }
            }
        }

        *self.state.write().await = WorkerState::Installed;
        self.skip_waiting.store(true, Ordering::SeqCst);
        tracing::info!(
            cache = %self.cache_version,
            cached = report.cached.len(),
            failed = report.failed.len(),
            "installed, skipping wait"
        );

        Ok(report)
    }

    async fn populate(&self, cache: &NamedCache, url: Url) -> Result<(), String> {
        let request = Request::get(url);
        let response = self.network.fetch(&request).await.map_err(|e| e.to_string())?;
        if !response.is_storable() {
            return Err(format!("status {}", response.status.as_u16()));
        }

        store(cache, &request.key(), response, self.max_entry_bytes)
            .await
            .map_err(|e| e.to_string())
    }

    /// Delete every cache except the current one, then claim open views.
    ///
    /// Returns the names of the deleted caches.
    pub async fn activate(&self) -> Result<Vec<String>, Error> {
        {
            let mut state = self.state.write().await;
            match *state {
                WorkerState::Installed | WorkerState::Activating => *state = WorkerState::Activating,
                other => return Err(Error::InvalidState(format!("cannot activate from {other:?}"))),
            }
        }

        tracing::info!(cache = %self.cache_version, "activating");
        let mut deleted = Vec::new();
        for name in self.storage.keys().await? {
            if name == self.cache_version {
                continue;
            }
            tracing::info!(cache = %name, "deleting old cache");
            if self.storage.delete(&name).await? {
                deleted.push(name);
            }
        }

        let claimed = self.clients.claim().await?;
        *self.state.write().await = WorkerState::Active;
        tracing::info!(cache = %self.cache_version, deleted = deleted.len(), claimed, "active");

        Ok(deleted)
    }
}
