//! End-to-end behaviour of the scan module over real backends.

use std::path::Path;
use std::sync::Arc;

use barscan_kv::{KVStore, MemoryStore, RedbStore};
use scan::store::LEGACY_SCANS_KEY;
use scan::{DeviceIdentity, ExportHistory, ExportKind, ExportMode, ScanStore, ScanWorkbench, UndoState};

fn open_redb(path: &Path) -> ScanWorkbench {
    let kv: Arc<dyn KVStore> = Arc::new(RedbStore::open(path).unwrap());
    let identity = Arc::new(DeviceIdentity::new(Arc::clone(&kv)));
    ScanWorkbench::open(Arc::new(ScanStore::new(kv, identity)))
}

fn device_store(kv: &Arc<dyn KVStore>, device: &str) -> Arc<ScanStore> {
    let identity = Arc::new(DeviceIdentity::with_fixed(Arc::clone(kv), device));
    Arc::new(ScanStore::new(Arc::clone(kv), identity))
}

#[test]
fn device_id_is_stable_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scans.redb");

    let first = open_redb(&path).device_id();
    let second = open_redb(&path).device_id();
    assert_eq!(first, second);
}

#[test]
fn devices_sharing_a_store_see_only_their_records() {
    let shared: Arc<dyn KVStore> = Arc::new(MemoryStore::new());
    let a = device_store(&shared, "device-a");
    let b = device_store(&shared, "device-b");

    a.save_scan("A000000001X1,0000000001", "barcode", None).unwrap();
    b.save_scan("B000000001X1,0000000002", "barcode", None).unwrap();

    let only_a = a.get_all_scans();
    assert_eq!(only_a.len(), 1);
    assert!(only_a.iter().all(|r| r.device_id == "device-a"));

    a.clear_all_scans().unwrap();
    assert_eq!(b.get_scan_count(), 1);
}

#[test]
fn saved_record_round_trips_with_notes() {
    let shared: Arc<dyn KVStore> = Arc::new(MemoryStore::new());
    let store = device_store(&shared, "d");
    let saved = store
        .save_scan("C123456789X1,1234567890", "barcode", Some("pallet 4"))
        .unwrap();

    let listed = store.get_all_scans();
    assert_eq!(listed, vec![saved]);
}

#[test]
fn batch_with_duplicates_then_undo_twice() {
    let shared: Arc<dyn KVStore> = Arc::new(MemoryStore::new());
    let mut bench = ScanWorkbench::open(device_store(&shared, "d"));
    bench.raw_mut().set(
        "A000000001X1,0000000001\n\
         A000000002X2,0000000002\n\
         A000000001X1,0000000001\n\
         A000000003X3 0000000003\n\
         A000000002X2,0000000009",
    );

    let outcome = bench.add_parsed_to_table().unwrap();
    assert_eq!(outcome.added, 3);
    assert_eq!(outcome.skipped, 2);
    assert_eq!(outcome.invalid, 0);
    assert_eq!(bench.store().get_scan_count(), 3);

    let undone = bench.undo_last_batch().unwrap();
    assert_eq!(undone.removed, 3);
    assert_eq!(undone.next_batch, None);
    assert!(bench.is_empty());
    assert_eq!(bench.store().get_scan_count(), 0);

    let again = bench.undo_last_batch().unwrap();
    assert_eq!(again.removed, 0);
}

#[test]
fn batch_skips_serials_persisted_before_open() {
    let shared: Arc<dyn KVStore> = Arc::new(MemoryStore::new());
    let store = device_store(&shared, "d");
    store
        .save_scan("A000000001X1,0000000001", "barcode", None)
        .unwrap();
    store
        .save_scan("A000000002X2,0000000002", "barcode", None)
        .unwrap();

    let mut bench = ScanWorkbench::open(store);
    bench.raw_mut().set(
        "A000000003X3,0000000003\n\
         A000000001X1,0000000001\n\
         A000000004X4,0000000004\n\
         A000000002X2,0000000099\n\
         A000000005X5,0000000005",
    );

    let outcome = bench.add_parsed_to_table().unwrap();
    assert_eq!((outcome.added, outcome.skipped, outcome.invalid), (3, 2, 0));
    assert_eq!(bench.store().get_scan_count(), 5);
    assert_eq!(bench.entries()[0].serial, "A000000005X5");

    assert_eq!(bench.undo_last_batch().unwrap().removed, 3);
    let left: Vec<&str> = bench.entries().iter().map(|e| e.serial.as_str()).collect();
    assert_eq!(left, vec!["A000000002X2", "A000000001X1"]);
}

#[test]
fn mixed_input_scenario() {
    let shared: Arc<dyn KVStore> = Arc::new(MemoryStore::new());
    let mut bench = ScanWorkbench::open(device_store(&shared, "d"));
    bench
        .raw_mut()
        .set("B987654321X5,4455667788\ngarbage line\nB987654321X5,4455667788");

    let outcome = bench.add_parsed_to_table().unwrap();
    assert_eq!(
        (outcome.added, outcome.skipped, outcome.invalid),
        (1, 1, 1)
    );
    assert_eq!(bench.entries()[0].serial, "B987654321X5");
    assert_eq!(bench.entries()[0].iuc, "4455667788");
}

#[test]
fn undo_after_restart_removes_only_last_batch() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scans.redb");

    {
        let mut bench = open_redb(&path);
        bench.capture_text("A000000001X1,0000000001");
        bench.add_parsed_to_table().unwrap();
        bench.capture_text("A000000002X2,0000000002");
        bench.capture_text("A000000003X3,0000000003");
        bench.add_parsed_to_table().unwrap();
    }

    let mut bench = open_redb(&path);
    assert_eq!(bench.len(), 3);
    assert!(matches!(bench.undo_state(), UndoState::Batch { added: 2, .. }));

    let undone = bench.undo_last_batch().unwrap();
    assert_eq!(undone.removed, 2);
    assert!(undone.next_batch.is_some());
    assert_eq!(bench.entries()[0].serial, "A000000001X1");
    drop(bench);

    assert_eq!(open_redb(&path).len(), 1);
}

#[test]
fn legacy_blob_is_migrated_once() {
    let shared: Arc<dyn KVStore> = Arc::new(MemoryStore::new());
    let legacy = r#"[
        {"id":"scan_2_b","deviceId":"d","content":"A000000002X2,0000000002","format":"barcode","timestamp":2},
        {"id":"scan_1_a","deviceId":"d","content":"A000000001X1,0000000001","format":"barcode","timestamp":1}
    ]"#;
    shared.set(LEGACY_SCANS_KEY, legacy.as_bytes()).unwrap();

    let store = device_store(&shared, "d");
    assert_eq!(store.migrate_legacy_blob().unwrap(), 2);
    assert_eq!(store.migrate_legacy_blob().unwrap(), 0);

    let bench = ScanWorkbench::open(store);
    let ids: Vec<&str> = bench.entries().iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["scan_2_b", "scan_1_a"]);
    assert_eq!(bench.undo_state(), UndoState::Untracked { added: 0 });
}

#[test]
fn migrating_after_new_scans_keeps_them_newest() {
    let shared: Arc<dyn KVStore> = Arc::new(MemoryStore::new());
    {
        let mut bench = ScanWorkbench::open(device_store(&shared, "d"));
        bench.capture_text("B987654321X5,4455667788");
        bench.add_parsed_to_table().unwrap();
    }
    let legacy = r#"[
        {"id":"scan_1_a","deviceId":"d","content":"A000000001X1,0000000001","format":"barcode","timestamp":1}
    ]"#;
    shared.set(LEGACY_SCANS_KEY, legacy.as_bytes()).unwrap();

    let store = device_store(&shared, "d");
    assert_eq!(store.migrate_legacy_blob().unwrap(), 1);

    let mut bench = ScanWorkbench::open(store);
    let serials: Vec<&str> = bench.entries().iter().map(|e| e.serial.as_str()).collect();
    assert_eq!(serials, vec!["B987654321X5", "A000000001X1"]);
    assert!(matches!(bench.undo_state(), UndoState::Batch { added: 1, .. }));

    assert_eq!(bench.undo_last_batch().unwrap().removed, 1);
    let left = bench.store().get_all_scans();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].id, "scan_1_a");
}

#[test]
fn export_and_history() {
    let shared: Arc<dyn KVStore> = Arc::new(MemoryStore::new());
    let mut bench = ScanWorkbench::open(device_store(&shared, "d"));
    bench.capture_text("A000000001X1,0000000001");
    bench.add_parsed_to_table().unwrap();

    let art = bench
        .export(ExportKind::Xlsx, ExportMode::Both, Some("shift"))
        .unwrap();
    let history = ExportHistory::new(Arc::clone(&shared));
    let saved = history.record(&art).unwrap();
    assert_eq!(saved.name, "shift.xlsx");

    let found = history.find("SHIFT", Some(ExportKind::Xlsx));
    assert_eq!(found.len(), 1);
    assert_eq!(ExportHistory::decode_payload(&found[0]).unwrap(), art.bytes);

    // Saved exports live beside the scans without showing up in them.
    assert_eq!(bench.store().get_scan_count(), 1);
}
