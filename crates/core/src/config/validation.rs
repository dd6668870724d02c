//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `cache_version` is empty or contains whitespace
    /// - `origin` is not an absolute http(s) URL
    /// - any `bypass_hosts` or `routes` entry is blank
    /// - `max_entry_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is set and is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    ///
    /// Returns `ConfigError::Missing` if `assets` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_version.is_empty() {
            return Err(ConfigError::Invalid { field: "cache_version".into(), reason: "must not be empty".into() });
        }
        if self.cache_version.chars().any(char::is_whitespace) {
            return Err(ConfigError::Invalid {
                field: "cache_version".into(),
                reason: "must not contain whitespace".into(),
            });
        }

        match url::Url::parse(&self.origin) {
            Ok(origin) if matches!(origin.scheme(), "http" | "https") => {}
            Ok(origin) => {
                return Err(ConfigError::Invalid {
                    field: "origin".into(),
                    reason: format!("unsupported scheme: {}", origin.scheme()),
                });
            }
            Err(e) => return Err(ConfigError::Invalid { field: "origin".into(), reason: e.to_string() }),
        }

        if self.assets.is_empty() {
            return Err(ConfigError::Missing {
                field: "assets".into(),
                hint: "list at least one resource to cache for offline use".into(),
            });
        }

        if self.bypass_hosts.iter().any(|h| h.trim().is_empty()) {
            return Err(ConfigError::Invalid { field: "bypass_hosts".into(), reason: "entries must not be blank".into() });
        }
        if self.routes.iter().any(|r| r.host.trim().is_empty()) {
            return Err(ConfigError::Invalid { field: "routes".into(), reason: "host must not be blank".into() });
        }

        if self.max_entry_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_entry_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_entry_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_entry_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if let Some(timeout_ms) = self.timeout_ms {
            if timeout_ms < 100 {
                return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
            }
            if timeout_ms > 300_000 {
                return Err(ConfigError::Invalid {
                    field: "timeout_ms".into(),
                    reason: "must not exceed 5 minutes (300000ms)".into(),
                });
            }
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        let overlapping = self
            .routes
            .iter()
            .filter(|r| self.bypass_hosts.iter().any(|h| h.eq_ignore_ascii_case(&r.host)))
            .count();
        if overlapping > 0 {
            tracing::warn!(
                overlapping,
                "Some routes also appear in bypass_hosts; \
                 the explicit route takes precedence"
            );
        }

        Ok(())
    }
}
