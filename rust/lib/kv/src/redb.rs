use std::fmt::Display;
use std::path::Path;

use redb::{Database, ReadableTable, StorageError, Table, TableDefinition};
use tracing::debug;

use crate::error::KVError;
use crate::traits::KVStore;

const TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("barscan");

type KvTable<'txn> = Table<'txn, &'static str, &'static [u8]>;

fn storage_err(e: impl Display) -> KVError {
    KVError::Storage(e.to_string())
}

/// RedbStore is the file-backed KVStore.
///
/// Everything lives in a single redb table. Each trait call is its own
/// transaction, so a `batch_set` or `batch_delete` lands completely or not
/// at all. redb holds an exclusive lock on the file while it is open: a
/// second `open` of the same path fails until the first store is dropped.
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Open or create a database at `path`.
    pub fn open(path: &Path) -> Result<Self, KVError> {
        let db = Database::create(path).map_err(storage_err)?;
        let store = Self { db };
        // Reads on a fresh file need the table to exist.
        store.write(|_| Ok(()))?;
        debug!("RedbStore: opened {}", path.display());
        Ok(store)
    }

    /// Apply `f` to the table in one write transaction and commit.
    fn write<F>(&self, f: F) -> Result<(), KVError>
    where
        F: FnOnce(&mut KvTable<'_>) -> Result<(), StorageError>,
    {
        let txn = self.db.begin_write().map_err(storage_err)?;
        {
            let mut table = txn.open_table(TABLE).map_err(storage_err)?;
            f(&mut table).map_err(storage_err)?;
        }
        txn.commit().map_err(storage_err)
    }
}

impl KVStore for RedbStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError> {
        let txn = self.db.begin_read().map_err(storage_err)?;
        let table = txn.open_table(TABLE).map_err(storage_err)?;
        let value = table.get(key).map_err(storage_err)?;
        Ok(value.map(|v| v.value().to_vec()))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), KVError> {
        self.write(|table| {
            table.insert(key, value)?;
            Ok(())
        })
    }

    fn delete(&self, key: &str) -> Result<(), KVError> {
        self.write(|table| {
            table.remove(key)?;
            Ok(())
        })
    }

    fn batch_set(&self, entries: &[(&str, &[u8])]) -> Result<(), KVError> {
        self.write(|table| {
            for (key, value) in entries {
                table.insert(*key, *value)?;
            }
            Ok(())
        })
    }

    fn batch_delete(&self, keys: &[&str]) -> Result<(), KVError> {
        self.write(|table| {
            for key in keys {
                table.remove(*key)?;
            }
            Ok(())
        })
    }

    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KVError> {
        let txn = self.db.begin_read().map_err(storage_err)?;
        let table = txn.open_table(TABLE).map_err(storage_err)?;

        let mut results = Vec::new();
        for entry in table.range(prefix..).map_err(storage_err)? {
            let (key, value) = entry.map_err(storage_err)?;
            let key = key.value();
            if !key.starts_with(prefix) {
                break;
            }
            results.push((key.to_string(), value.value().to_vec()));
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (RedbStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbStore::open(&dir.path().join("test.redb")).unwrap();
        (store, dir)
    }

    #[test]
    fn set_get_delete() {
        let (store, _dir) = open_temp();
        assert!(store.get("a").unwrap().is_none());

        store.set("a", b"1".as_slice()).unwrap();
        assert_eq!(store.get("a").unwrap(), Some(b"1".to_vec()));

        store.set("a", b"2".as_slice()).unwrap();
        assert_eq!(store.get("a").unwrap(), Some(b"2".to_vec()));

        store.delete("a").unwrap();
        assert!(store.get("a").unwrap().is_none());

        // Deleting again is fine.
        store.delete("a").unwrap();
    }

    #[test]
    fn scan_stops_at_prefix_boundary() {
        let (store, _dir) = open_temp();
        store
            .batch_set(&[
                ("scan:rec:d1:01", b"x".as_slice()),
                ("scan:rec:d1:02", b"y".as_slice()),
                ("scan:rec:d2:01", b"z".as_slice()),
                ("scan:seq:d1", b"2".as_slice()),
            ])
            .unwrap();

        let d1 = store.scan("scan:rec:d1:").unwrap();
        let keys: Vec<&str> = d1.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["scan:rec:d1:01", "scan:rec:d1:02"]);

        assert_eq!(store.scan("scan:").unwrap().len(), 4);
        assert!(store.scan("nothing:").unwrap().is_empty());
    }

    #[test]
    fn batch_delete_removes_all() {
        let (store, _dir) = open_temp();
        store
            .batch_set(&[
                ("k1", b"1".as_slice()),
                ("k2", b"2".as_slice()),
                ("k3", b"3".as_slice()),
            ])
            .unwrap();
        store.batch_delete(&["k1", "k3", "missing"]).unwrap();
        assert!(store.get("k1").unwrap().is_none());
        assert_eq!(store.get("k2").unwrap(), Some(b"2".to_vec()));
        assert!(store.get("k3").unwrap().is_none());
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("persist.redb");
        {
            let store = RedbStore::open(&path).unwrap();
            store.set("device:id", b"abc".as_slice()).unwrap();
        }
        let store = RedbStore::open(&path).unwrap();
        assert_eq!(store.get("device:id").unwrap(), Some(b"abc".to_vec()));
    }

    #[test]
    fn second_open_waits_for_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locked.redb");
        let first = RedbStore::open(&path).unwrap();
        assert!(RedbStore::open(&path).is_err());
        drop(first);
        assert!(RedbStore::open(&path).is_ok());
    }
}
