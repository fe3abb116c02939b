use std::collections::HashSet;

use crate::model::{BatchTag, ScanEntry, ScanRecord};

/// In-memory rows shown to the user, newest first.
#[derive(Debug, Clone, Default)]
pub struct ScanTable {
    entries: Vec<ScanEntry>,
}

impl ScanTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from store records, which already come newest first.
    pub fn from_records(records: &[ScanRecord]) -> Self {
        Self {
            entries: records.iter().map(ScanEntry::from).collect(),
        }
    }

    pub fn entries(&self) -> &[ScanEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn first(&self) -> Option<&ScanEntry> {
        self.entries.first()
    }

    pub fn get(&self, id: &str) -> Option<&ScanEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Serials currently in the table.
    pub fn serials(&self) -> HashSet<String> {
        self.entries.iter().map(|e| e.serial.clone()).collect()
    }

    /// Put `entries` (newest first) in front of the existing rows.
    pub fn prepend(&mut self, entries: Vec<ScanEntry>) {
        self.entries.splice(0..0, entries);
    }

    /// Ids of the rows carrying `tag`.
    pub fn batch_ids(&self, tag: BatchTag) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.batch_id == Some(tag))
            .map(|e| e.id.clone())
            .collect()
    }

    pub fn count_batch(&self, tag: BatchTag) -> usize {
        self.entries.iter().filter(|e| e.batch_id == Some(tag)).count()
    }

    /// Ids of the `n` newest rows.
    pub fn newest_ids(&self, n: usize) -> Vec<String> {
        self.entries.iter().take(n).map(|e| e.id.clone()).collect()
    }

    /// The tag of the newest tagged row.
    pub fn latest_batch(&self) -> Option<BatchTag> {
        self.entries.iter().find_map(|e| e.batch_id)
    }

    /// Drop the rows whose id is in `ids`. Returns how many were dropped.
    pub fn remove_ids(&mut self, ids: &[String]) -> usize {
        let ids: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let before = self.entries.len();
        self.entries.retain(|e| !ids.contains(e.id.as_str()));
        before - self.entries.len()
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        before != self.entries.len()
    }

    pub fn set_notes(&mut self, id: &str, notes: &str) -> bool {
        match self.entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.notes = Some(notes.to_string());
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
