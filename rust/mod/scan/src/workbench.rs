use std::sync::Arc;

use barscan_core::ServiceError;
use tracing::info;

use crate::buffer::RawBuffer;
use crate::export::{ExportArtifact, ExportError, ExportKind, ExportMode};
use crate::ingest::{commit_batch, BatchOutcome};
use crate::model::{BatchTag, ScanEntry};
use crate::parse::{parse_raw, ParsedBatch};
use crate::store::ScanStore;
use crate::table::ScanTable;
use crate::undo::{UndoOutcome, UndoState, UndoTracker};

/// ScanWorkbench is what a scanning screen works against.
///
/// Owns the raw review buffer, the table of the current device's records and
/// the undo tracker. Every mutation goes to the store first and is mirrored
/// into the table only once the store accepted it.
pub struct ScanWorkbench {
    store: Arc<ScanStore>,
    table: ScanTable,
    raw: RawBuffer,
    undo: UndoTracker,
}

impl ScanWorkbench {
    /// Load the current device's records.
    pub fn open(store: Arc<ScanStore>) -> Self {
        let table = ScanTable::from_records(&store.get_all_scans());
        let undo = UndoTracker::from_table(&table);
        info!(
            "workbench opened for device {} with {} scans",
            store.device_id(),
            table.len()
        );
        Self {
            store,
            table,
            raw: RawBuffer::new(),
            undo,
        }
    }

    pub fn store(&self) -> &Arc<ScanStore> {
        &self.store
    }

    pub fn device_id(&self) -> String {
        self.store.device_id()
    }

    pub fn entries(&self) -> &[ScanEntry] {
        self.table.entries()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn raw(&self) -> &RawBuffer {
        &self.raw
    }

    pub fn raw_mut(&mut self) -> &mut RawBuffer {
        &mut self.raw
    }

    /// Append typed text to the raw buffer.
    pub fn capture_text(&mut self, text: &str) -> bool {
        self.raw.push(text)
    }

    /// Validation result of the raw buffer as it stands.
    pub fn preview(&self) -> ParsedBatch {
        parse_raw(self.raw.as_str())
    }

    pub fn clear_raw(&mut self) {
        self.raw.clear();
    }

    pub fn undo_state(&self) -> UndoState {
        self.undo.state()
    }

    /// Validate the raw buffer and commit its new rows as one batch.
    pub fn add_parsed_to_table(&mut self) -> Result<BatchOutcome, ServiceError> {
        let parsed = self.preview();
        if parsed.valid.is_empty() {
            return Err(ServiceError::Validation(format!(
                "no valid rows ({} of {} lines invalid)",
                parsed.invalid, parsed.total
            )));
        }

        let tag = BatchTag::next_after(self.table.latest_batch());
        let commit = commit_batch(&self.store, self.table.serials(), &parsed.valid, tag);
        let added = commit.entries.len();
        if added > 0 {
            self.table.prepend(commit.entries.clone());
            self.undo.arm(tag, added);
        }
        if let Some(e) = commit.failure {
            return Err(e);
        }

        self.raw.clear();
        info!(
            "batch {}: {} added, {} skipped, {} invalid",
            tag, added, commit.skipped, parsed.invalid
        );
        Ok(BatchOutcome {
            batch: tag,
            added,
            skipped: commit.skipped,
            invalid: parsed.invalid,
            total: parsed.total,
            entries: commit.entries,
        })
    }

    /// Remove the last committed batch.
    pub fn undo_last_batch(&mut self) -> Result<UndoOutcome, ServiceError> {
        self.undo.undo(&self.store, &mut self.table)
    }

    pub fn delete_scan(&mut self, id: &str) -> Result<(), ServiceError> {
        self.store.delete_scan(id)?;
        self.table.remove(id);
        Ok(())
    }

    pub fn update_notes(&mut self, id: &str, notes: &str) -> Result<(), ServiceError> {
        self.store.update_scan_notes(id, notes)?;
        self.table.set_notes(id, notes);
        Ok(())
    }

    /// Remove every record of this device. Returns how many were removed.
    pub fn clear_all(&mut self) -> Result<usize, ServiceError> {
        let removed = self.store.clear_all_scans()?;
        self.table.clear();
        self.undo.reset();
        Ok(removed)
    }

    /// Reload the table from the store.
    pub fn refresh(&mut self) {
        self.table = ScanTable::from_records(&self.store.get_all_scans());
    }

    /// Render the table. The table itself is left as is.
    pub fn export(
        &self,
        kind: ExportKind,
        mode: ExportMode,
        name: Option<&str>,
    ) -> Result<ExportArtifact, ExportError> {
        ExportArtifact::build(self.table.entries(), kind, mode, name)
    }
}
