use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::KVError;
use crate::traits::KVStore;

/// MemoryStore keeps everything in a process-local ordered map.
///
/// It satisfies the same contract as `RedbStore` (sorted prefix scans,
/// all-or-nothing batches) but nothing survives the process. Share one
/// instance through `Arc` to model several components on one backing store.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, Vec<u8>>>, KVError> {
        self.entries
            .read()
            .map_err(|_| KVError::Storage("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, Vec<u8>>>, KVError> {
        self.entries
            .write()
            .map_err(|_| KVError::Storage("memory store lock poisoned".into()))
    }
}

impl KVStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError> {
        Ok(self.read()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), KVError> {
        self.write()?.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), KVError> {
        self.write()?.remove(key);
        Ok(())
    }

    fn batch_set(&self, entries: &[(&str, &[u8])]) -> Result<(), KVError> {
        let mut map = self.write()?;
        for (key, value) in entries {
            map.insert((*key).to_string(), value.to_vec());
        }
        Ok(())
    }

    fn batch_delete(&self, keys: &[&str]) -> Result<(), KVError> {
        let mut map = self.write()?;
        for key in keys {
            map.remove(*key);
        }
        Ok(())
    }

    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KVError> {
        let map = self.read()?;
        let mut results = Vec::new();
        for (key, value) in map.range(prefix.to_string()..) {
            if !key.starts_with(prefix) {
                break;
            }
            results.push((key.clone(), value.clone()));
        }
        Ok(results)
    }
}
