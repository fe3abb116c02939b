use barscan_core::ServiceError;
use tracing::{debug, info};

use crate::model::BatchTag;
use crate::store::ScanStore;
use crate::table::ScanTable;

/// What the next undo would remove.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UndoState {
    /// Nothing to undo.
    #[default]
    Idle,
    /// The rows of one committed batch.
    Batch { tag: BatchTag, added: usize },
    /// Rows exist but carry no tag; undo removes the `max(added, 1)` newest.
    Untracked { added: usize },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UndoOutcome {
    /// Rows removed from both the table and the store.
    pub removed: usize,
    /// The newest tag still present after the undo.
    pub next_batch: Option<BatchTag>,
}

/// Single-level undo of the last batch commit.
#[derive(Debug, Clone, Default)]
pub struct UndoTracker {
    state: UndoState,
}

impl UndoTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the tracker from a freshly loaded table.
    ///
    /// Tags are persisted on records, so the last batch of a previous session
    /// is still undoable.
    pub fn from_table(table: &ScanTable) -> Self {
        let state = match table.first() {
            None => UndoState::Idle,
            Some(newest) => match newest.batch_id {
                Some(tag) => UndoState::Batch {
                    tag,
                    added: table.count_batch(tag),
                },
                None => UndoState::Untracked { added: 0 },
            },
        };
        Self { state }
    }

    pub fn state(&self) -> UndoState {
        self.state
    }

    pub fn arm(&mut self, tag: BatchTag, added: usize) {
        self.state = UndoState::Batch { tag, added };
    }

    pub fn reset(&mut self) {
        self.state = UndoState::Idle;
    }

    /// Remove the last batch from `store` and `table`.
    ///
    /// Store first: if the delete fails the table and the state are left as
    /// they were and the error is returned.
    pub fn undo(
        &mut self,
        store: &ScanStore,
        table: &mut ScanTable,
    ) -> Result<UndoOutcome, ServiceError> {
        let state = std::mem::take(&mut self.state);
        if table.is_empty() {
            debug!("undo: table empty");
            return Ok(UndoOutcome::default());
        }

        let ids = match state {
            UndoState::Idle => {
                debug!("undo: nothing to undo");
                return Ok(UndoOutcome::default());
            }
            UndoState::Batch { tag, .. } => table.batch_ids(tag),
            UndoState::Untracked { added } => table.newest_ids(added.max(1)),
        };

        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        if let Err(e) = store.delete_scans(&refs) {
            self.state = state;
            return Err(e);
        }

        let removed = table.remove_ids(&ids);
        let next_batch = table.latest_batch();
        info!("undo removed {} rows", removed);
        Ok(UndoOutcome { removed, next_batch })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use barscan_kv::{KVStore, MemoryStore};

    use super::*;
    use crate::device::DeviceIdentity;
    use crate::testing::FlakyStore;

    fn store_on(kv: Arc<dyn KVStore>) -> ScanStore {
        let identity = Arc::new(DeviceIdentity::with_fixed(Arc::clone(&kv), "d1"));
        ScanStore::new(kv, identity)
    }

    fn seed(store: &ScanStore) -> ScanTable {
        store.save_scan("A000000001X1,0000000001", "barcode", None).unwrap();
        store
            .save_scan_in_batch("A000000002X2,0000000002", "barcode", None, BatchTag(10))
            .unwrap();
        store
            .save_scan_in_batch("A000000003X3,0000000003", "barcode", None, BatchTag(20))
            .unwrap();
        store
            .save_scan_in_batch("A000000004X4,0000000004", "barcode", None, BatchTag(20))
            .unwrap();
        ScanTable::from_records(&store.get_all_scans())
    }

    #[test]
    fn seeds_from_newest_tag() {
        let store = store_on(Arc::new(MemoryStore::new()));
        let table = seed(&store);
        let tracker = UndoTracker::from_table(&table);
        assert_eq!(
            tracker.state(),
            UndoState::Batch {
                tag: BatchTag(20),
                added: 2
            }
        );
        assert_eq!(UndoTracker::from_table(&ScanTable::new()).state(), UndoState::Idle);
    }

    #[test]
    fn batch_undo_removes_tagged_rows_once() {
        let store = store_on(Arc::new(MemoryStore::new()));
        let mut table = seed(&store);
        let mut tracker = UndoTracker::from_table(&table);

        let outcome = tracker.undo(&store, &mut table).unwrap();
        assert_eq!(outcome.removed, 2);
        assert_eq!(outcome.next_batch, Some(BatchTag(10)));
        assert_eq!(table.len(), 2);
        assert_eq!(store.get_scan_count(), 2);
        assert_eq!(tracker.state(), UndoState::Idle);

        let again = tracker.undo(&store, &mut table).unwrap();
        assert_eq!(again, UndoOutcome::default());
        assert_eq!(store.get_scan_count(), 2);
    }

    #[test]
    fn untracked_undo_removes_newest() {
        let store = store_on(Arc::new(MemoryStore::new()));
        store.save_scan("a", "barcode", None).unwrap();
        store.save_scan("b", "barcode", None).unwrap();
        let mut table = ScanTable::from_records(&store.get_all_scans());
        let mut tracker = UndoTracker::from_table(&table);
        assert_eq!(tracker.state(), UndoState::Untracked { added: 0 });

        let outcome = tracker.undo(&store, &mut table).unwrap();
        assert_eq!(outcome.removed, 1);
        assert_eq!(table.first().map(|e| e.serial.as_str()), Some("a"));
        assert_eq!(store.get_all_scans()[0].content, "a");
    }

    #[test]
    fn untracked_count_is_bounded() {
        let store = store_on(Arc::new(MemoryStore::new()));
        store.save_scan("a", "barcode", None).unwrap();
        let mut table = ScanTable::from_records(&store.get_all_scans());
        let mut tracker = UndoTracker::new();
        tracker.state = UndoState::Untracked { added: 5 };

        assert_eq!(tracker.undo(&store, &mut table).unwrap().removed, 1);
        assert!(table.is_empty());
    }

    #[test]
    fn empty_table_is_noop() {
        let store = store_on(Arc::new(MemoryStore::new()));
        let mut table = ScanTable::new();
        let mut tracker = UndoTracker::new();
        tracker.arm(BatchTag(1), 3);
        assert_eq!(tracker.undo(&store, &mut table).unwrap().removed, 0);
    }

    #[test]
    fn store_failure_leaves_everything_in_place() {
        let flaky = Arc::new(FlakyStore::new());
        let store = store_on(flaky.clone());
        let mut table = seed(&store);
        let mut tracker = UndoTracker::from_table(&table);
        let before = tracker.state();

        flaky.fail_writes(true);
        assert!(tracker.undo(&store, &mut table).is_err());
        assert_eq!(table.len(), 4);
        assert_eq!(tracker.state(), before);

        flaky.fail_writes(false);
        assert_eq!(tracker.undo(&store, &mut table).unwrap().removed, 2);
    }
}
