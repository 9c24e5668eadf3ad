//! KVCache Common - Shared types and utilities
//!
//! This crate provides the key and mode types, the error taxonomy and the
//! configuration structures used across all KVCache components.

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{CacheStoreError, Result};
pub use types::*;
