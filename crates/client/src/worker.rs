//! One relay version: lifecycle, router and notification relay built from a
//! single config, plus the host events that drive them.

use std::sync::Arc;

use bytes::Bytes;
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use pwa_relay_core::{AppConfig, AssetManifest, CacheDb, CacheStorage, Error};

use crate::clients::{ClientRegistry, ClientView};
use crate::fetch::{FetchClient, FetchConfig, Network, Request, resolve};
use crate::lifecycle::{InstallReport, Lifecycle};
use crate::notify::{ClickOutcome, Notification, NotificationRelay, NotificationTray};
use crate::route::RouteTable;
use crate::router::Router;

/// An intercepted request as described by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchEvent {
    #[serde(default = "default_method")]
    pub method: String,
    /// Absolute, or relative to the origin.
    pub url: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
}

fn default_method() -> String {
    "GET".into()
}

/// Events the host delivers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    Install,
    Activate,
    Fetch(FetchEvent),
    Message {
        data: Value,
    },
    Push {
        #[serde(default)]
        data: Option<String>,
    },
    NotificationClick {
        notification: Notification,
    },
    ViewOpened {
        view: ClientView,
    },
    ViewClosed {
        id: String,
    },
}

impl HostEvent {
    pub fn name(&self) -> &'static str {
        match self {
            HostEvent::Install => "install",
            HostEvent::Activate => "activate",
            HostEvent::Fetch(_) => "fetch",
            HostEvent::Message { .. } => "message",
            HostEvent::Push { .. } => "push",
            HostEvent::NotificationClick { .. } => "notification_click",
            HostEvent::ViewOpened { .. } => "view_opened",
            HostEvent::ViewClosed { .. } => "view_closed",
        }
    }
}

/// A fully read response handed back to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedResponse {
    pub status: u16,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub from_cache: bool,
    pub body: Bytes,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    Installed { report: InstallReport, skip_waiting: bool },
    Activated { deleted: Vec<String> },
    Fetched(FetchedResponse),
    /// `None` when a message was not a notification request.
    Notified(Option<Notification>),
    Clicked(ClickOutcome),
    Ack,
}

pub struct Worker {
    origin: Url,
    lifecycle: Lifecycle,
    router: Router,
    relay: NotificationRelay,
    clients: Arc<ClientRegistry>,
    tray: Arc<NotificationTray>,
}

impl Worker {
    pub fn new(config: &AppConfig, storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("origin: {e}")))?;
        let clients = Arc::new(ClientRegistry::new(origin.clone()));
        let tray = Arc::new(NotificationTray::new());

        let lifecycle = Lifecycle::new(
            config.cache_version.clone(),
            origin.clone(),
            AssetManifest::from_config(config),
            config.install_policy,
            storage.clone(),
            network.clone(),
            clients.clone(),
        )
        .with_max_entry_bytes(config.max_entry_bytes);
        let router = Router::new(config.cache_version.clone(), storage, network, RouteTable::from_config(config))
            .with_max_entry_bytes(config.max_entry_bytes);
        let relay = NotificationRelay::new(config.notifications.clone(), tray.clone(), clients.clone());

        Ok(Self { origin, lifecycle, router, relay, clients, tray })
    }

    /// Open the on-disk cache and a real HTTP client.
    pub async fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let storage = CacheDb::open(&config.db_path).await?;
        let network = FetchClient::new(&FetchConfig::from_app_config(config))?;
        Self::new(config, Arc::new(storage), Arc::new(network))
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    pub fn tray(&self) -> &NotificationTray {
        &self.tray
    }

    pub async fn dispatch(&self, event: HostEvent) -> Result<EventOutcome, Error> {
        match event {
            HostEvent::Install => {
                let report = self.lifecycle.install().await?;
                Ok(EventOutcome::Installed { report, skip_waiting: self.lifecycle.skip_waiting_requested() })
            }
            HostEvent::Activate => Ok(EventOutcome::Activated { deleted: self.lifecycle.activate().await? }),
            HostEvent::Fetch(fetch) => self.fetch(fetch).await.map(EventOutcome::Fetched),
            HostEvent::Message { data } => self.relay.handle_message(&data).await.map(EventOutcome::Notified),
            HostEvent::Push { data } => {
                let notification = self.relay.handle_push(data.as_deref().map(str::as_bytes)).await?;
                Ok(EventOutcome::Notified(Some(notification)))
            }
            HostEvent::NotificationClick { notification } => {
                self.relay.handle_click(&notification).await.map(EventOutcome::Clicked)
            }
            HostEvent::ViewOpened { view } => {
                self.clients.add(view).await;
                Ok(EventOutcome::Ack)
            }
            HostEvent::ViewClosed { id } => {
                if self.clients.remove(&id).await.is_none() {
                    tracing::debug!(%id, "closed view was not tracked");
                }
                Ok(EventOutcome::Ack)
            }
        }
    }

    async fn fetch(&self, event: FetchEvent) -> Result<FetchedResponse, Error> {
        let request = self.request(event)?;
        let response = self.router.handle(request).await?;

        let status = response.status.as_u16();
        let url = response.url.to_string();
        let from_cache = response.from_cache;
        let headers = response
            .headers
            .iter()
            .filter_map(|(name, value)| Some((name.to_string(), value.to_str().ok()?.to_string())))
            .collect();
        let body = response.bytes().await?;

        Ok(FetchedResponse { status, url, headers, from_cache, body })
    }

    fn request(&self, event: FetchEvent) -> Result<Request, Error> {
        let method = Method::from_bytes(event.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| Error::InvalidInput(format!("bad method: {}", event.method)))?;
        let url = resolve(&self.origin, &event.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        let mut headers = HeaderMap::new();
        for (name, value) in event.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| Error::InvalidInput(format!("bad header name: {name}")))?;
            let value = HeaderValue::from_str(&value)
                .map_err(|_| Error::InvalidInput(format!("bad value for header {name}")))?;
            headers.append(name, value);
        }

        Ok(Request { method, url, headers })
    }
}
