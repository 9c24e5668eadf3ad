//! Configuration types for KVCache
//!
//! This module defines the configuration file structure read by the server.
//! Every section has defaults, so an empty or missing file is valid.

use crate::error::{CacheStoreError, Result};
use crate::types::CacheMode;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Cache capacity used when none (or an invalid one) is configured
pub const DEFAULT_CACHE_CAPACITY: usize = 10;

/// Root configuration for KVCache
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cache configuration
    pub cache: CacheConfig,
    /// Backing store configuration
    pub store: StoreConfig,
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text)
            .map_err(|e| CacheStoreError::invalid_input(format!("invalid configuration: {e}")))
    }

    /// Load the configuration file at `path`, or defaults if it does not exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|e| {
            CacheStoreError::invalid_input(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Check values that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.cache.capacity == 0 {
            return Err(CacheStoreError::invalid_input(
                "cache capacity must be a positive integer",
            ));
        }
        if self.store.backend == StoreBackend::Redb && self.store.path.as_os_str().is_empty() {
            return Err(CacheStoreError::invalid_input(
                "redb backend requires a store path",
            ));
        }
        Ok(())
    }
}

/// Cache sizing and consistency mode
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached entries
    pub capacity: usize,
    /// Consistency mode with the backing store
    pub mode: CacheMode,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
            mode: CacheMode::WriteThrough,
        }
    }
}

/// Which backing store implementation to run against
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreBackend {
    /// Persistent redb database file
    #[default]
    Redb,
    /// Volatile in-process map (development and tests)
    Memory,
}

impl FromStr for StoreBackend {
    type Err = CacheStoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redb" => Ok(Self::Redb),
            "memory" | "mem" => Ok(Self::Memory),
            other => Err(CacheStoreError::invalid_input(format!(
                "unknown store backend '{other}' (expected redb or memory)"
            ))),
        }
    }
}

/// Backing store configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store implementation
    pub backend: StoreBackend,
    /// Database file for the redb backend
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Redb,
            path: PathBuf::from("./kvcache-data/kv.redb"),
        }
    }
}

/// HTTP server configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address for the HTTP API
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

/// Logging configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
