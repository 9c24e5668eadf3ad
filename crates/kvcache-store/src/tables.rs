//! Redb table definitions for the persistent key-value store.

use redb::TableDefinition;

// Key: record key, Value: UTF-8 payload
pub const KV: TableDefinition<i64, &str> = TableDefinition::new("kv");
