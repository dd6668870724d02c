//! SQLite-backed cache store for request/response snapshots.
//!
//! This module provides a persistent, versioned cache store using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - Named caches, one per cache version
//! - Request identity keys (method + URL) hashed with SHA-256
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod storage;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::{RequestKey, Snapshot};
pub use storage::{CacheStorage, NamedCache};
