//! Client views: the open pages this relay serves.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use url::Url;

use pwa_relay_core::Error;

use crate::fetch::resolve;

/// Kind of client view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    #[default]
    Window,
    Worker,
    SharedWorker,
    All,
}

/// An open page (or worker) as seen by the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientView {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub client_type: ClientType,
    #[serde(default)]
    pub focused: bool,
    /// Whether this relay version serves the view's requests.
    #[serde(default)]
    pub controlled: bool,
}

/// Host API over open client views.
#[async_trait]
pub trait ClientViews: Send + Sync {
    async fn match_all(&self, client_type: ClientType) -> Result<Vec<ClientView>, Error>;

    /// Bring a view to the foreground.
    async fn focus(&self, id: &str) -> Result<ClientView, Error>;

    /// Open a new window. Relative URLs resolve against the origin.
    async fn open_window(&self, url: &str) -> Result<ClientView, Error>;

    /// Take control of every open view without a reload. Returns how many.
    async fn claim(&self) -> Result<usize, Error>;
}

/// In-process registry of client views.
pub struct ClientRegistry {
    origin: Url,
    views: RwLock<Vec<ClientView>>,
    next_id: AtomicU64,
}

impl ClientRegistry {
    pub fn new(origin: Url) -> Self {
        Self { origin, views: RwLock::new(Vec::new()), next_id: AtomicU64::new(1) }
    }

    /// Track a view the host reports as open. Replaces a view with the same id.
    pub async fn add(&self, view: ClientView) {
        let mut views = self.views.write().await;
        views.retain(|v| v.id != view.id);
        views.push(view);
    }

    pub async fn remove(&self, id: &str) -> Option<ClientView> {
        let mut views = self.views.write().await;
        let index = views.iter().position(|v| v.id == id)?;
        Some(views.remove(index))
    }

    pub async fn snapshot(&self) -> Vec<ClientView> {
        self.views.read().await.clone()
    }
}

#[async_trait]
impl ClientViews for ClientRegistry {
    async fn match_all(&self, client_type: ClientType) -> Result<Vec<ClientView>, Error> {
        let views = self.views.read().await;
        Ok(views
            .iter()
            .filter(|v| client_type == ClientType::All || v.client_type == client_type)
            .cloned()
            .collect())
    }

    async fn focus(&self, id: &str) -> Result<ClientView, Error> {
        let mut views = self.views.write().await;
        let target = views
            .iter()
            .position(|v| v.id == id)
            .ok_or_else(|| Error::Client(format!("no client view with id {id}")))?;
        if views[target].client_type != ClientType::Window {
            return Err(Error::Client("can only focus window clients".into()));
        }

        for (index, view) in views.iter_mut().enumerate() {
            view.focused = index == target;
        }
        Ok(views[target].clone())
    }

    async fn open_window(&self, url: &str) -> Result<ClientView, Error> {
        let url = resolve(&self.origin, url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let id = format!("view-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        let view = ClientView {
            id,
            url: url.to_string(),
            client_type: ClientType::Window,
            focused: true,
            controlled: true,
        };

        let mut views = self.views.write().await;
        for other in views.iter_mut() {
            other.focused = false;
        }
        views.push(view.clone());
        tracing::info!(id = %view.id, url = %view.url, "opened client window");
        Ok(view)
    }

    async fn claim(&self) -> Result<usize, Error> {
        let mut views = self.views.write().await;
        for view in views.iter_mut() {
            view.controlled = true;
        }
        Ok(views.len())
    }
}
