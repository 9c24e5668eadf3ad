//! Core type definitions for KVCache
//!
//! This module defines the key type and the consistency mode shared by the
//! cache, the backing stores and the server.

use crate::error::CacheStoreError;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Key of a cached record
///
/// Keys are plain integers with stable identity across the cache and the
/// backing store.
pub type Key = i64;

/// Consistency mode between the cache and the backing store
///
/// Fixed per cache instance for its whole lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "kebab-case")]
pub enum CacheMode {
    /// Every mutation is committed to the backing store before the cache
    #[default]
    #[display("write-through")]
    WriteThrough,
    /// Mutations land in the cache and reach the store on eviction or flush
    #[display("write-back")]
    WriteBack,
}

impl CacheMode {
    /// Whether mutations are held dirty in the cache
    #[must_use]
    pub const fn is_write_back(self) -> bool {
        matches!(self, Self::WriteBack)
    }
}

impl FromStr for CacheMode {
    type Err = CacheStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "write-through" | "writethrough" | "wt" => Ok(Self::WriteThrough),
            "write-back" | "writeback" | "wb" => Ok(Self::WriteBack),
            other => Err(CacheStoreError::invalid_input(format!(
                "unknown cache mode '{other}' (expected write-through or write-back)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parse() {
        assert_eq!("write-through".parse::<CacheMode>().unwrap(), CacheMode::WriteThrough);
        assert_eq!("WriteBack".parse::<CacheMode>().unwrap(), CacheMode::WriteBack);
        assert_eq!("write_back".parse::<CacheMode>().unwrap(), CacheMode::WriteBack);
        assert_eq!(" wt ".parse::<CacheMode>().unwrap(), CacheMode::WriteThrough);
        assert!("write-around".parse::<CacheMode>().is_err());
    }

    #[test]
    fn test_mode_display_round_trips_through_parse() {
        for mode in [CacheMode::WriteThrough, CacheMode::WriteBack] {
            assert_eq!(mode.to_string().parse::<CacheMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_mode_default_is_write_through() {
        assert_eq!(CacheMode::default(), CacheMode::WriteThrough);
        assert!(!CacheMode::WriteThrough.is_write_back());
        assert!(CacheMode::WriteBack.is_write_back());
    }
}
