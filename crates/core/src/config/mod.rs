//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (STASH_*)
//! 2. TOML config file (if STASH_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! The loaded value is immutable and handed to the engine at construction, so
//! several independent engines can run side by side (e.g. two versions sharing
//! one store in tests).

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::model::PartitionRole;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (STASH_*)
/// 2. TOML config file (if STASH_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Origin the application is served from; responses from it are same-origin.
    ///
    /// Set via STASH_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Root-relative paths pre-cached into the static partition at install.
    #[serde(default = "default_manifest")]
    pub manifest: Vec<String>,

    /// Version tag of the static partition.
    ///
    /// Set via STASH_STATIC_VERSION environment variable.
    #[serde(default = "default_version")]
    pub static_version: u32,

    /// Version tag of the dynamic partition.
    ///
    /// Set via STASH_DYNAMIC_VERSION environment variable.
    #[serde(default = "default_version")]
    pub dynamic_version: u32,

    /// Maximum number of entries kept in the dynamic partition.
    #[serde(default = "default_max_dynamic_entries")]
    pub max_dynamic_entries: usize,

    /// Interval between eviction sweeps in milliseconds.
    #[serde(default = "default_eviction_interval_ms")]
    pub eviction_interval_ms: u64,

    /// Upper bound for a network-first fetch in milliseconds.
    #[serde(default = "default_network_timeout_ms")]
    pub network_timeout_ms: u64,

    /// Maximum bytes to fetch per request.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Path prefix routed network-first.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// File extensions routed stale-while-revalidate.
    #[serde(default = "default_asset_extensions")]
    pub asset_extensions: Vec<String>,

    /// Static document served to navigations when everything else fails.
    #[serde(default = "default_offline_document")]
    pub offline_document: String,

    /// Name of the background task registered on reconnect.
    #[serde(default = "default_resync_tag")]
    pub resync_tag: String,

    /// Path to a SQLite store; in-memory when unset.
    ///
    /// Set via STASH_DB_PATH environment variable.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_manifest() -> Vec<String> {
    ["/", "/index.html", "/style.css", "/script.js", "/manifest.json"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_version() -> u32 {
    1
}

fn default_max_dynamic_entries() -> usize {
    100
}

fn default_eviction_interval_ms() -> u64 {
    300_000
}

fn default_network_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_user_agent() -> String {
    "stash/0.1".into()
}

fn default_api_prefix() -> String {
    "/api/".into()
}

fn default_asset_extensions() -> Vec<String> {
    ["css", "js", "png", "jpg", "jpeg", "gif", "svg", "woff", "woff2"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_offline_document() -> String {
    "/".into()
}

fn default_resync_tag() -> String {
    "background-sync".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            manifest: default_manifest(),
            static_version: default_version(),
            dynamic_version: default_version(),
            max_dynamic_entries: default_max_dynamic_entries(),
            eviction_interval_ms: default_eviction_interval_ms(),
            network_timeout_ms: default_network_timeout_ms(),
            max_bytes: default_max_bytes(),
            user_agent: default_user_agent(),
            api_prefix: default_api_prefix(),
            asset_extensions: default_asset_extensions(),
            offline_document: default_offline_document(),
            resync_tag: default_resync_tag(),
            db_path: None,
        }
    }
}

impl AppConfig {
    /// Network-first fetch bound as Duration.
    pub fn network_timeout(&self) -> Duration {
        Duration::from_millis(self.network_timeout_ms)
    }

    /// Eviction sweep period as Duration.
    pub fn eviction_interval(&self) -> Duration {
        Duration::from_millis(self.eviction_interval_ms)
    }

    /// Parsed origin URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the origin is not an http(s) URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(ConfigError::Invalid { field: "origin".into(), reason: format!("unsupported scheme {scheme}") }),
        }
    }

    /// Currently declared partition name for a role.
    pub fn partition_name(&self, role: PartitionRole) -> String {
        match role {
            PartitionRole::Static => role.partition_name(self.static_version),
            PartitionRole::Dynamic => role.partition_name(self.dynamic_version),
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `STASH_`
    /// 2. TOML file from `STASH_CONFIG_FILE` (if set)
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

        if let Ok(config_path) = std::env::var("STASH_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("STASH_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
