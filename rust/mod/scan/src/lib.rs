//! Scan module: the local, per-device scan record store.
//!
//! Records live in one shared key-value store, partitioned by the device
//! identity of the installation that wrote them. Raw text from the decoder
//! (or typed by hand) is validated into `(serial, IUC)` pairs and committed
//! in batches that can be undone as a unit.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use barscan_kv::{KVStore, RedbStore};
//! use scan::{DeviceIdentity, ScanStore, ScanWorkbench};
//!
//! let kv: Arc<dyn KVStore> =
//!     Arc::new(RedbStore::open(std::path::Path::new("scans.redb")).unwrap());
//! let identity = Arc::new(DeviceIdentity::new(Arc::clone(&kv)));
//! let store = Arc::new(ScanStore::new(kv, identity));
//!
//! let mut bench = ScanWorkbench::open(store);
//! bench.capture_text("B987654321X5,4455667788");
//! let outcome = bench.add_parsed_to_table().unwrap();
//! assert_eq!(outcome.added, 1);
//! bench.undo_last_batch().unwrap();
//! ```

pub mod buffer;
pub mod capture;
pub mod device;
pub mod export;
pub mod exports;
pub mod ingest;
pub mod model;
pub mod parse;
pub mod store;
pub mod table;
pub mod undo;
pub mod workbench;

#[cfg(test)]
pub(crate) mod testing;

pub use buffer::RawBuffer;
pub use capture::{Capture, CaptureSession, DecodeEvent, DecoderError};
pub use device::DeviceIdentity;
pub use export::{ExportArtifact, ExportError, ExportKind, ExportMode};
pub use exports::{ExportHistory, SavedExport};
pub use ingest::BatchOutcome;
pub use model::{BatchTag, ScanEntry, ScanPair, ScanRecord};
pub use parse::{parse_raw, ParsedBatch};
pub use store::ScanStore;
pub use table::ScanTable;
pub use undo::{UndoOutcome, UndoState, UndoTracker};
pub use workbench::ScanWorkbench;
