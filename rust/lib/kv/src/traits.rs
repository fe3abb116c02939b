use crate::error::KVError;

/// KVStore provides the durable key-value capability the scan module runs on.
///
/// Keys follow a namespaced convention: `device:id`, `scan:rec:{device}:{seq}`,
/// `export:{id}`. Values are opaque bytes (UTF-8 JSON in practice).
pub trait KVStore: Send + Sync {
    /// Get the value for a key. Returns None if the key does not exist.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError>;

    /// Set a key-value pair, replacing any previous value.
    fn set(&self, key: &str, value: &[u8]) -> Result<(), KVError>;

    /// Delete a key. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> Result<(), KVError>;

    /// Set several pairs atomically: either all are written or none are.
    fn batch_set(&self, entries: &[(&str, &[u8])]) -> Result<(), KVError>;

    /// Delete several keys atomically.
    fn batch_delete(&self, keys: &[&str]) -> Result<(), KVError>;

    /// Scan all keys matching a prefix. Returns (key, value) pairs sorted by key.
    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KVError>;
}
