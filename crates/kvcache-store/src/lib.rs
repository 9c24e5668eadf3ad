//! KVCache Store - backing store adapters
//!
//! The cache coordinator only ever talks to a [`BackingStore`]. This crate
//! defines that trait and ships two implementations:
//!
//! - [`RedbStore`]: persistent, one redb write transaction per mutation
//! - [`MemoryStore`]: volatile map with switchable outages and injectable
//!   faults, used for development and tests

pub mod backing;
pub mod error;
pub mod memory;
pub mod redb_store;
mod tables;

pub use backing::{BackingStore, StoreOp};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use redb_store::RedbStore;
