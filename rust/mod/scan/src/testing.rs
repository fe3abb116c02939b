//! Test doubles shared by the unit tests.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use barscan_kv::{KVError, KVStore, MemoryStore};

/// A MemoryStore whose reads and writes can be switched to fail.
pub struct FlakyStore {
    inner: MemoryStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    /// Writes still allowed before every write fails. Negative: unlimited.
    write_budget: AtomicI64,
}

impl Default for FlakyStore {
    fn default() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            write_budget: AtomicI64::new(-1),
        }
    }
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let `n` more write calls through, then fail the rest.
    pub fn fail_writes_after(&self, n: i64) {
        self.write_budget.store(n, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    fn check_read(&self) -> Result<(), KVError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(KVError::Storage("read refused".into()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), KVError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(KVError::Storage("write refused".into()));
        }
        let budget = self.write_budget.load(Ordering::SeqCst);
        if budget == 0 {
            return Err(KVError::Storage("write budget exhausted".into()));
        }
        if budget > 0 {
            self.write_budget.store(budget - 1, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl KVStore for FlakyStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError> {
        self.check_read()?;
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), KVError> {
        self.check_write()?;
        self.inner.set(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), KVError> {
        self.check_write()?;
        self.inner.delete(key)
    }

    fn batch_set(&self, entries: &[(&str, &[u8])]) -> Result<(), KVError> {
        self.check_write()?;
        self.inner.batch_set(entries)
    }

    fn batch_delete(&self, keys: &[&str]) -> Result<(), KVError> {
        self.check_write()?;
        self.inner.batch_delete(keys)
    }

    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KVError> {
        self.check_read()?;
        self.inner.scan(prefix)
    }
}
