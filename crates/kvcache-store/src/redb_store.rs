//! Persistent backing store backed by redb.
//!
//! Every mutation is one write transaction that is committed before the call
//! returns. Existence checks for insert/update happen inside the same write
//! transaction, so a concurrent writer cannot slip in between check and
//! write. redb is a blocking API; calls run on tokio's blocking pool.

use crate::backing::BackingStore;
use crate::error::{StoreError, StoreResult};
use crate::tables;
use async_trait::async_trait;
use kvcache_common::Key;
use redb::{Database, ReadableTable, ReadableTableMetadata};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Persistent key-value store backed by redb.
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open (or create) the redb database at the given path.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Create the table eagerly so later read txns don't fail
        let write_txn = db.begin_write()?;
        {
            let _t = write_txn.open_table(tables::KV)?;
        }
        write_txn.commit()?;

        info!("Opened redb store at {}", path.display());
        Ok(Self { db: Arc::new(db) })
    }

    /// Number of stored records
    pub fn len(&self) -> StoreResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(tables::KV)?;
        Ok(table.len()?)
    }

    /// Check if the store holds no records
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Run a blocking closure against the database on the blocking pool
    async fn blocking<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> StoreResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| StoreError::unavailable(format!("store task failed: {e}")))?
    }
}

fn read_value(db: &Database, key: Key) -> StoreResult<Option<String>> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(tables::KV)?;
    Ok(table.get(key)?.map(|v| v.value().to_string()))
}

fn write_value(db: &Database, key: Key, value: &str, must_exist: bool) -> StoreResult<()> {
    let write_txn = db.begin_write()?;
    {
        let mut table = write_txn.open_table(tables::KV)?;
        let exists = table.get(key)?.is_some();
        match (exists, must_exist) {
            (true, false) => return Err(StoreError::AlreadyExists(key)),
            (false, true) => return Err(StoreError::NotFound(key)),
            _ => {}
        }
        table.insert(key, value)?;
    }
    write_txn.commit()?;
    Ok(())
}

fn remove_value(db: &Database, key: Key) -> StoreResult<()> {
    let write_txn = db.begin_write()?;
    let removed = {
        let mut table = write_txn.open_table(tables::KV)?;
        table.remove(key)?.is_some()
    };
    if !removed {
        return Err(StoreError::NotFound(key));
    }
    write_txn.commit()?;
    Ok(())
}

#[async_trait]
impl BackingStore for RedbStore {
    fn name(&self) -> &'static str {
        "redb"
    }

    async fn exists(&self, key: Key) -> StoreResult<bool> {
        self.blocking(move |db| Ok(read_value(db, key)?.is_some()))
            .await
    }

    async fn insert(&self, key: Key, value: &str) -> StoreResult<()> {
        let value = value.to_string();
        self.blocking(move |db| write_value(db, key, &value, false))
            .await?;
        debug!("redb: inserted key {}", key);
        Ok(())
    }

    async fn update(&self, key: Key, value: &str) -> StoreResult<()> {
        let value = value.to_string();
        self.blocking(move |db| write_value(db, key, &value, true))
            .await?;
        debug!("redb: updated key {}", key);
        Ok(())
    }

    async fn read(&self, key: Key) -> StoreResult<String> {
        self.blocking(move |db| read_value(db, key)?.ok_or(StoreError::NotFound(key)))
            .await
    }

    async fn delete(&self, key: Key) -> StoreResult<()> {
        self.blocking(move |db| remove_value(db, key)).await?;
        debug!("redb: deleted key {}", key);
        Ok(())
    }
}
