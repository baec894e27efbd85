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
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `origin` is not an http(s) URL
    /// - a manifest entry or `offline_document` is not root-relative
    /// - `max_dynamic_entries` is 0
    /// - `eviction_interval_ms` is below 1s or above 24h
    /// - `network_timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `user_agent` or `resync_tag` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.origin_url()?;

        if let Some(entry) = self.manifest.iter().find(|p| !p.starts_with('/')) {
            return Err(ConfigError::Invalid {
                field: "manifest".into(),
                reason: format!("entry {entry:?} must start with '/'"),
            });
        }

        if !self.offline_document.starts_with('/') {
            return Err(ConfigError::Invalid { field: "offline_document".into(), reason: "must start with '/'".into() });
        }

        if !self.api_prefix.starts_with('/') {
            return Err(ConfigError::Invalid { field: "api_prefix".into(), reason: "must start with '/'".into() });
        }

        if self.max_dynamic_entries == 0 {
            return Err(ConfigError::Invalid {
                field: "max_dynamic_entries".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.eviction_interval_ms < 1_000 {
            return Err(ConfigError::Invalid {
                field: "eviction_interval_ms".into(),
                reason: "must be at least 1000ms".into(),
            });
        }
        if self.eviction_interval_ms > 86_400_000 {
            return Err(ConfigError::Invalid {
                field: "eviction_interval_ms".into(),
                reason: "must not exceed 24 hours (86400000ms)".into(),
            });
        }

        if self.network_timeout_ms < 100 {
            return Err(ConfigError::Invalid {
                field: "network_timeout_ms".into(),
                reason: "must be at least 100ms".into(),
            });
        }
        if self.network_timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "network_timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.resync_tag.trim().is_empty() {
            return Err(ConfigError::Invalid { field: "resync_tag".into(), reason: "must not be empty".into() });
        }

        if self.manifest.is_empty() {
            tracing::warn!(
                static_version = self.static_version,
                "manifest is empty; install will create an empty static partition"
            );
        }

        Ok(())
    }
}
