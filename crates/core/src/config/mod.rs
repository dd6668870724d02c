//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (PWA_RELAY_*)
//! 2. TOML config file (if PWA_RELAY_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// How a request is served once its host has been classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Straight to the network. The cache store is never touched.
    NetworkOnly,
    /// Serve from cache when present, otherwise fetch and fill.
    CacheFirst,
    /// Fetch and fill, fall back to the cache when the network fails.
    NetworkFirst,
    /// Serve from cache immediately and refresh in the background.
    StaleWhileRevalidate,
}

/// What install does when an asset cannot be populated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallPolicy {
    /// Log the failure and keep going.
    #[default]
    Permissive,
    /// Abort install on the first failed asset.
    Strict,
}

/// An explicit host rule, evaluated before the bypass set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRule {
    pub host: String,
    pub strategy: Strategy,
}

/// Fallback values for notification fields missing from a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationDefaults {
    #[serde(default = "default_notification_title")]
    pub title: String,
    #[serde(default = "default_notification_body")]
    pub body: String,
    #[serde(default = "default_icon")]
    pub icon: String,
    #[serde(default = "default_icon")]
    pub badge: String,
    #[serde(default = "default_tag")]
    pub tag: String,
    #[serde(default = "default_target_url")]
    pub url: String,
    #[serde(default = "default_vibrate")]
    pub vibrate: Vec<u32>,
}

impl Default for NotificationDefaults {
    fn default() -> Self {
        Self {
            title: default_notification_title(),
            body: default_notification_body(),
            icon: default_icon(),
            badge: default_icon(),
            tag: default_tag(),
            url: default_target_url(),
            vibrate: default_vibrate(),
        }
    }
}

fn default_notification_title() -> String {
    "GoChat Pro".into()
}

fn default_notification_body() -> String {
    "You have a new message!".into()
}

fn default_icon() -> String {
    "/image/genre/20.png".into()
}

fn default_tag() -> String {
    "gochat-message".into()
}

fn default_target_url() -> String {
    "/mobile.html".into()
}

fn default_vibrate() -> Vec<u32> {
    vec![200, 100, 200]
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (PWA_RELAY_*)
/// 2. TOML config file (if PWA_RELAY_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Name of the current cache. Bumping it retires every older cache on
    /// the next activation.
    ///
    /// Set via PWA_RELAY_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Origin that relative asset paths and notification targets resolve against.
    ///
    /// Set via PWA_RELAY_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Path to SQLite cache database.
    ///
    /// Set via PWA_RELAY_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Resources that must be cached for offline use.
    #[serde(default = "default_assets")]
    pub assets: Vec<String>,

    /// Hosts whose requests always go straight to the network.
    ///
    /// Set via PWA_RELAY_BYPASS_HOSTS environment variable.
    #[serde(default = "default_bypass_hosts")]
    pub bypass_hosts: Vec<String>,

    /// Extra host rules, checked before `bypass_hosts`.
    #[serde(default)]
    pub routes: Vec<RouteRule>,

    /// Strategy for hosts no rule matches.
    #[serde(default = "default_strategy")]
    pub default_strategy: Strategy,

    /// Behaviour when an asset fails to download during install.
    #[serde(default)]
    pub install_policy: InstallPolicy,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via PWA_RELAY_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Largest response body written to the cache store. Bigger responses
    /// are still served, just never stored.
    ///
    /// Set via PWA_RELAY_MAX_ENTRY_BYTES environment variable.
    #[serde(default = "default_max_entry_bytes")]
    pub max_entry_bytes: usize,

    /// Optional HTTP request timeout in milliseconds. Unset means requests
    /// may stall indefinitely.
    ///
    /// Set via PWA_RELAY_TIMEOUT_MS environment variable.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Notification fallbacks.
    #[serde(default)]
    pub notifications: NotificationDefaults,
}

fn default_cache_version() -> String {
    "gochat-v6".into()
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./pwa-relay-cache.sqlite")
}

fn default_assets() -> Vec<String> {
    [
        "/",
        "/index.html",
        "/mobile.html",
        "/manifest.json",
        "/profile.html",
        "/user-profile.html",
        "/group-profile.html",
        "/image/genre/20.png",
        "/note.mp3",
        "/night-owl.mp3",
        "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.5.0/css/all.min.css",
        "https://fonts.googleapis.com/css2?family=Inter:wght@300;400;600&display=swap",
        "https://cdnjs.cloudflare.com/ajax/libs/crypto-js/4.1.1/crypto-js.min.js",
        "https://www.gstatic.com/firebasejs/9.23.0/firebase-app-compat.js",
        "https://www.gstatic.com/firebasejs/9.23.0/firebase-database-compat.js",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_bypass_hosts() -> Vec<String> {
    vec!["firebasedatabase.app".into(), "cloudinary.com".into(), "meet.jit.si".into()]
}

fn default_strategy() -> Strategy {
    Strategy::StaleWhileRevalidate
}

fn default_user_agent() -> String {
    "pwa-relay/0.1".into()
}

fn default_max_entry_bytes() -> usize {
    5_242_880 // 5MB
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_version: default_cache_version(),
            origin: default_origin(),
            db_path: default_db_path(),
            assets: default_assets(),
            bypass_hosts: default_bypass_hosts(),
            routes: Vec::new(),
            default_strategy: default_strategy(),
            install_policy: InstallPolicy::Permissive,
            user_agent: default_user_agent(),
            max_entry_bytes: default_max_entry_bytes(),
            timeout_ms: None,
            notifications: NotificationDefaults::default(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest, if one is configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `PWA_RELAY_`
    /// 2. TOML file from `PWA_RELAY_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("PWA_RELAY_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("PWA_RELAY_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
