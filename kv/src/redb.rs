//! Redb-based persistent store implementation.

use std::path::Path;

use redb::{Database, ReadableTable, TableDefinition};

use crate::{KvError, KvResult, KvStore};

const TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("kv");

/// A persistent blob store backed by redb.
///
/// Every operation runs in its own transaction, so a profile write commits
/// as a single atomic replacement.
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Open or create a redb store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> KvResult<Self> {
        let db = Database::create(path).map_err(|e| KvError::Storage(e.to_string()))?;

        // Create the table if it doesn't exist
        let tx = db
            .begin_write()
            .map_err(|e| KvError::Storage(e.to_string()))?;
        {
            let _ = tx
                .open_table(TABLE)
                .map_err(|e| KvError::Storage(e.to_string()))?;
        }
        tx.commit().map_err(|e| KvError::Storage(e.to_string()))?;

        Ok(Self { db })
    }
}

impl KvStore for RedbStore {
    fn get(&self, key: &str) -> KvResult<Option<Vec<u8>>> {
        let tx = self
            .db
            .begin_read()
            .map_err(|e| KvError::Storage(e.to_string()))?;
        let table = tx
            .open_table(TABLE)
            .map_err(|e| KvError::Storage(e.to_string()))?;

        match table
            .get(key)
            .map_err(|e| KvError::Storage(e.to_string()))?
        {
            Some(value) => Ok(Some(value.value().to_vec())),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> KvResult<()> {
        let tx = self
            .db
            .begin_write()
            .map_err(|e| KvError::Storage(e.to_string()))?;
        {
            let mut table = tx
                .open_table(TABLE)
                .map_err(|e| KvError::Storage(e.to_string()))?;
            table
                .insert(key, value)
                .map_err(|e| KvError::Storage(e.to_string()))?;
        }
        tx.commit().map_err(|e| KvError::Storage(e.to_string()))?;
        Ok(())
    }

    fn delete(&self, key: &str) -> KvResult<()> {
        let tx = self
            .db
            .begin_write()
            .map_err(|e| KvError::Storage(e.to_string()))?;
        {
            let mut table = tx
                .open_table(TABLE)
                .map_err(|e| KvError::Storage(e.to_string()))?;
            table
                .remove(key)
                .map_err(|e| KvError::Storage(e.to_string()))?;
        }
        tx.commit().map_err(|e| KvError::Storage(e.to_string()))?;
        Ok(())
    }

    fn scan_keys(&self, prefix: &str) -> KvResult<Vec<String>> {
        let tx = self
            .db
            .begin_read()
            .map_err(|e| KvError::Storage(e.to_string()))?;
        let table = tx
            .open_table(TABLE)
            .map_err(|e| KvError::Storage(e.to_string()))?;

        let mut keys = Vec::new();
        for item in table.iter().map_err(|e| KvError::Storage(e.to_string()))? {
            let (key, _) = item.map_err(|e| KvError::Storage(e.to_string()))?;
            let key_str = key.value();
            if key_str.starts_with(prefix) {
                keys.push(key_str.to_string());
            }
        }

        keys.sort();
        Ok(keys)
    }
}
