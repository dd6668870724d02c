//! Core types and shared functionality for pwa-relay.
//!
//! This crate provides:
//! - Cache store implementation with SQLite backend
//! - The asset manifest
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod manifest;

pub use cache::{CacheDb, CacheStorage, NamedCache, RequestKey, Snapshot};
pub use config::{AppConfig, ConfigError, InstallPolicy, NotificationDefaults, RouteRule, Strategy};
pub use error::Error;
pub use manifest::AssetManifest;
