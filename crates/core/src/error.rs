//! Unified error types for pwa-relay.
//!
//! Every variant renders with a stable code prefix so host replies and
//! log lines can be matched without parsing free-form text.

use tokio_rusqlite::rusqlite;

/// Unified error types for the relay.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input (e.g. a non-GET request handed to the cache store).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// URL could not be parsed or resolved against the origin.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// The network request itself failed (DNS, connect, reset...).
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// Reading a response body failed, or the body was already consumed.
    #[error("BODY_ERROR: {0}")]
    Body(String),

    /// Response body is too large to be written to the cache store.
    #[error("ENTRY_TOO_LARGE: {0}")]
    EntryTooLarge(String),

    /// An asset could not be populated during a strict install.
    #[error("INSTALL_FAILED: {url}: {reason}")]
    AssetFailed { url: String, reason: String },

    /// A lifecycle transition was requested out of order.
    #[error("INVALID_STATE: {0}")]
    InvalidState(String),

    /// A client view operation failed.
    #[error("CLIENT_ERROR: {0}")]
    Client(String),
}

impl Error {
    /// Stable code for this error, without the message.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::InvalidUrl(_) => "INVALID_URL",
            Error::Database(_) | Error::MigrationFailed(_) => "CACHE_ERROR",
            Error::Network(_) => "NETWORK_ERROR",
            Error::Body(_) => "BODY_ERROR",
            Error::EntryTooLarge(_) => "ENTRY_TOO_LARGE",
            Error::AssetFailed { .. } => "INSTALL_FAILED",
            Error::InvalidState(_) => "INVALID_STATE",
            Error::Client(_) => "CLIENT_ERROR",
        }
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidInput(err.to_string())
    }
}
