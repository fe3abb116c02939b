use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use barscan_core::{now_millis, ServiceError};
use barscan_kv::{KVError, KVStore};
use tracing::{debug, info, warn};

use crate::device::DeviceIdentity;
use crate::model::{BatchTag, ScanRecord};

/// Key of the single JSON list the first app versions kept every record in.
pub const LEGACY_SCANS_KEY: &str = "tonnex_scans";

const SEQ_WIDTH: usize = 20;

fn record_prefix(device_id: &str) -> String {
    format!("scan:rec:{}:", device_id)
}

fn record_key(device_id: &str, seq: u64) -> String {
    format!("scan:rec:{}:{:0width$}", device_id, seq, width = SEQ_WIDTH)
}

fn seq_key(device_id: &str) -> String {
    format!("scan:seq:{}", device_id)
}

fn index_key(record_id: &str) -> String {
    format!("scan:idx:{}", record_id)
}

/// True if `key` is a record slot directly under `prefix`.
///
/// A device id may itself contain `:`, so `scan:rec:a:` also prefixes the
/// records of device `a:b`. Only a bare sequence number may follow.
fn is_own_slot(key: &str, prefix: &str) -> bool {
    key.strip_prefix(prefix)
        .is_some_and(|rest| rest.len() == SEQ_WIDTH && rest.bytes().all(|b| b.is_ascii_digit()))
}

fn storage_err(e: KVError) -> ServiceError {
    ServiceError::Storage(e.to_string())
}

/// ScanStore persists scan records for every device sharing one KV store.
///
/// Layout:
///
/// ```text
/// scan:rec:{device}:{seq:020}  → ScanRecord (JSON), seq grows per insert
/// scan:seq:{device}            → last used seq
/// scan:idx:{record id}         → the scan:rec key of that record
/// ```
///
/// Listing a device is a prefix scan of its partition read backwards, so
/// results come out newest first. Queries always run for the device resolved
/// by the injected [`DeviceIdentity`]; other devices' records are never
/// returned and never cleared.
///
/// One logical writer per store is assumed. Two processes writing the same
/// file race on the sequence counter and the last writer wins.
pub struct ScanStore {
    kv: Arc<dyn KVStore>,
    identity: Arc<DeviceIdentity>,
}

impl ScanStore {
    pub fn new(kv: Arc<dyn KVStore>, identity: Arc<DeviceIdentity>) -> Self {
        Self { kv, identity }
    }

    pub fn identity(&self) -> &Arc<DeviceIdentity> {
        &self.identity
    }

    pub fn device_id(&self) -> String {
        self.identity.device_id()
    }

    /// Persist a new record for the current device and return it.
    ///
    /// Write failures are returned, never swallowed.
    pub fn save_scan(
        &self,
        content: &str,
        format: &str,
        notes: Option<&str>,
    ) -> Result<ScanRecord, ServiceError> {
        self.save(content, format, notes, None)
    }

    /// Like [`save_scan`](Self::save_scan), tagging the record with a batch.
    pub fn save_scan_in_batch(
        &self,
        content: &str,
        format: &str,
        notes: Option<&str>,
        batch: BatchTag,
    ) -> Result<ScanRecord, ServiceError> {
        self.save(content, format, notes, Some(batch))
    }

    fn save(
        &self,
        content: &str,
        format: &str,
        notes: Option<&str>,
        batch: Option<BatchTag>,
    ) -> Result<ScanRecord, ServiceError> {
        let now = now_millis();
        let record = ScanRecord {
            id: ScanRecord::generate_id(now),
            device_id: self.identity.device_id(),
            content: content.to_string(),
            format: format.to_string(),
            timestamp: now,
            notes: notes.map(str::to_string),
            batch_id: batch,
        };
        self.insert(&record)?;
        debug!("scan saved: {} ({})", record.id, record.content);
        Ok(record)
    }

    /// Write a record as the newest of its device, with its index entry and
    /// the bumped sequence, in one transaction.
    fn insert(&self, record: &ScanRecord) -> Result<(), ServiceError> {
        let seq = self.next_seq(&record.device_id)?;
        let key = record_key(&record.device_id, seq);
        let idx = index_key(&record.id);
        let seq_k = seq_key(&record.device_id);
        let seq_v = seq.to_string();
        let data = serde_json::to_vec(record)
            .map_err(|e| ServiceError::Internal(format!("serialize: {}", e)))?;

        self.kv
            .batch_set(&[
                (key.as_str(), data.as_slice()),
                (idx.as_str(), key.as_bytes()),
                (seq_k.as_str(), seq_v.as_bytes()),
            ])
            .map_err(storage_err)
    }

    fn next_seq(&self, device_id: &str) -> Result<u64, ServiceError> {
        match self.kv.get(&seq_key(device_id)).map_err(storage_err)? {
            Some(bytes) => {
                let last = std::str::from_utf8(&bytes)
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .ok_or_else(|| {
                        ServiceError::Internal(format!("corrupt sequence for device {}", device_id))
                    })?;
                Ok(last + 1)
            }
            None => Ok(1),
        }
    }

    /// All records of the current device, newest first.
    ///
    /// Listing is best effort: an unreadable store yields an empty list and a
    /// record that fails to decode is skipped.
    pub fn get_all_scans(&self) -> Vec<ScanRecord> {
        let device_id = self.identity.device_id();
        match self.list_device(&device_id) {
            Ok(records) => records.into_iter().map(|(_, r)| r).collect(),
            Err(e) => {
                warn!("listing scans for device {} failed: {}", device_id, e);
                Vec::new()
            }
        }
    }

    /// Number of records of the current device.
    pub fn get_scan_count(&self) -> usize {
        self.get_all_scans().len()
    }

    /// (key, record) pairs of one device, newest first.
    fn list_device(&self, device_id: &str) -> Result<Vec<(String, ScanRecord)>, ServiceError> {
        let prefix = record_prefix(device_id);
        let entries = self.kv.scan(&prefix).map_err(storage_err)?;

        let mut records = Vec::with_capacity(entries.len());
        for (key, bytes) in entries.into_iter().rev() {
            if !is_own_slot(&key, &prefix) {
                continue;
            }
            match serde_json::from_slice::<ScanRecord>(&bytes) {
                Ok(record) if record.device_id == device_id => records.push((key, record)),
                Ok(record) => warn!(
                    "record {} under {} belongs to device {}, skipping",
                    record.id, key, record.device_id
                ),
                Err(e) => warn!("undecodable record at {}: {}", key, e),
            }
        }
        Ok(records)
    }

    fn locate(&self, record_id: &str) -> Result<Option<String>, ServiceError> {
        match self.kv.get(&index_key(record_id)).map_err(storage_err)? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| ServiceError::Internal(format!("index for {}: {}", record_id, e))),
            None => Ok(None),
        }
    }

    /// Delete one record by id, whichever device owns it. Unknown ids are a no-op.
    pub fn delete_scan(&self, record_id: &str) -> Result<(), ServiceError> {
        self.delete_scans(&[record_id]).map(|_| ())
    }

    /// Delete several records in one transaction. Returns how many existed.
    pub fn delete_scans(&self, record_ids: &[&str]) -> Result<usize, ServiceError> {
        let mut keys = Vec::with_capacity(record_ids.len() * 2);
        for id in record_ids {
            match self.locate(id)? {
                Some(key) => {
                    keys.push(key);
                    keys.push(index_key(id));
                }
                None => debug!("delete: scan {} not found", id),
            }
        }
        if keys.is_empty() {
            return Ok(0);
        }

        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        self.kv.batch_delete(&refs).map_err(storage_err)?;
        let removed = keys.len() / 2;
        debug!("deleted {} scans", removed);
        Ok(removed)
    }

    /// Replace the notes of a record. Unknown ids are a no-op.
    pub fn update_scan_notes(&self, record_id: &str, notes: &str) -> Result<(), ServiceError> {
        let Some(key) = self.locate(record_id)? else {
            debug!("update notes: scan {} not found", record_id);
            return Ok(());
        };
        let Some(bytes) = self.kv.get(&key).map_err(storage_err)? else {
            return Ok(());
        };

        let mut record: ScanRecord = serde_json::from_slice(&bytes)
            .map_err(|e| ServiceError::Internal(format!("deserialize: {}", e)))?;
        record.notes = Some(notes.to_string());
        let data = serde_json::to_vec(&record)
            .map_err(|e| ServiceError::Internal(format!("serialize: {}", e)))?;
        self.kv.set(&key, &data).map_err(storage_err)?;
        debug!("scan notes updated: {}", record_id);
        Ok(())
    }

    /// Remove every record of the current device. Returns how many were removed.
    pub fn clear_all_scans(&self) -> Result<usize, ServiceError> {
        let device_id = self.identity.device_id();
        let prefix = record_prefix(&device_id);
        let entries = self.kv.scan(&prefix).map_err(storage_err)?;

        let mut keys = Vec::new();
        let mut removed = 0;
        for (key, bytes) in entries {
            if !is_own_slot(&key, &prefix) {
                continue;
            }
            match serde_json::from_slice::<ScanRecord>(&bytes) {
                Ok(record) if record.device_id != device_id => continue,
                Ok(record) => keys.push(index_key(&record.id)),
                // Undecodable slot in our partition: drop it too.
                Err(_) => {}
            }
            keys.push(key);
            removed += 1;
        }

        if !keys.is_empty() {
            let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
            self.kv.batch_delete(&refs).map_err(storage_err)?;
        }
        info!("cleared {} scans for device {}", removed, device_id);
        Ok(removed)
    }

    /// Move records from the legacy single-list blob into the partitioned
    /// layout. Ids already present are skipped; the blob is removed afterwards.
    ///
    /// Legacy records are interleaved with the records already stored by
    /// timestamp, so a device that saved scans before migrating still lists
    /// its newest scan first.
    pub fn migrate_legacy_blob(&self) -> Result<usize, ServiceError> {
        let Some(bytes) = self.kv.get(LEGACY_SCANS_KEY).map_err(storage_err)? else {
            return Ok(0);
        };
        let legacy: Vec<ScanRecord> = serde_json::from_slice(&bytes)
            .map_err(|e| ServiceError::Internal(format!("legacy scans blob: {}", e)))?;

        // The blob is newest first.
        let mut seen = HashSet::new();
        let mut by_device: BTreeMap<String, Vec<ScanRecord>> = BTreeMap::new();
        for record in legacy.into_iter().rev() {
            if !seen.insert(record.id.clone()) || self.locate(&record.id)?.is_some() {
                continue;
            }
            by_device
                .entry(record.device_id.clone())
                .or_default()
                .push(record);
        }

        let mut migrated = 0;
        for (device_id, incoming) in by_device {
            migrated += incoming.len();
            self.merge_into(&device_id, incoming)?;
        }

        self.kv.delete(LEGACY_SCANS_KEY).map_err(storage_err)?;
        info!("migrated {} legacy scans", migrated);
        Ok(migrated)
    }

    /// Rewrite the partition of `device_id` with `incoming` (oldest first)
    /// merged in by timestamp. Records with equal timestamps keep legacy
    /// ones first.
    fn merge_into(&self, device_id: &str, incoming: Vec<ScanRecord>) -> Result<(), ServiceError> {
        let existing = self.list_device(device_id)?;
        let stale: Vec<String> = existing.iter().map(|(key, _)| key.clone()).collect();

        let mut merged = incoming;
        merged.extend(existing.into_iter().rev().map(|(_, record)| record));
        merged.sort_by_key(|r| r.timestamp);

        let first = self.next_seq(device_id)?;
        let mut last = first;
        let mut owned: Vec<(String, Vec<u8>)> = Vec::with_capacity(merged.len() * 2 + 1);
        for (seq, record) in (first..).zip(&merged) {
            let key = record_key(device_id, seq);
            let data = serde_json::to_vec(record)
                .map_err(|e| ServiceError::Internal(format!("serialize: {}", e)))?;
            owned.push((index_key(&record.id), key.clone().into_bytes()));
            owned.push((key, data));
            last = seq;
        }
        owned.push((seq_key(device_id), last.to_string().into_bytes()));

        let entries: Vec<(&str, &[u8])> = owned
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
            .collect();
        self.kv.batch_set(&entries).map_err(storage_err)?;

        // New slots sit above every old one, so the old ones can go now.
        if !stale.is_empty() {
            let refs: Vec<&str> = stale.iter().map(String::as_str).collect();
            self.kv.batch_delete(&refs).map_err(storage_err)?;
        }
        debug!(
            "device {}: {} scans after legacy merge",
            device_id,
            merged.len()
        );
        Ok(())
    }
}
