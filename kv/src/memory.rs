//! In-memory store implementation for testing and ephemeral deployments.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::{KvError, KvResult, KvStore};

/// An in-memory blob store backed by a HashMap.
///
/// Cloning yields a handle to the same underlying map, so a cloned store
/// observes writes made through the original.
#[derive(Clone)]
pub struct MemoryStore {
    data: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> KvResult<Option<Vec<u8>>> {
        let data = self
            .data
            .lock()
            .map_err(|e| KvError::Storage(e.to_string()))?;
        Ok(data.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> KvResult<()> {
        let mut data = self
            .data
            .lock()
            .map_err(|e| KvError::Storage(e.to_string()))?;
        data.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> KvResult<()> {
        let mut data = self
            .data
            .lock()
            .map_err(|e| KvError::Storage(e.to_string()))?;
        data.remove(key);
        Ok(())
    }

    fn scan_keys(&self, prefix: &str) -> KvResult<Vec<String>> {
        let data = self
            .data
            .lock()
            .map_err(|e| KvError::Storage(e.to_string()))?;
        let mut keys: Vec<String> = data
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}
