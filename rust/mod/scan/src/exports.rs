use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use barscan_core::{new_id, now_rfc3339, ServiceError};
use barscan_kv::KVStore;

use crate::export::{ExportArtifact, ExportKind, ExportMode};

const EXPORT_PREFIX: &str = "export:";

fn export_key(id: &str) -> String {
    format!("{}{}", EXPORT_PREFIX, id)
}

/// Snapshot of a produced export file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SavedExport {
    pub id: String,
    /// File name including the extension.
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ExportKind,
    #[serde(rename = "exportType")]
    pub mode: ExportMode,
    /// RFC 3339.
    pub created_at: String,
    pub row_count: usize,
    /// CSV text, or the XLSX bytes in base64.
    pub data: String,
}

impl SavedExport {
    fn created_millis(&self) -> i64 {
        DateTime::parse_from_rfc3339(&self.created_at)
            .map(|t| t.timestamp_millis())
            .unwrap_or(i64::MIN)
    }
}

/// Saved export snapshots, kept in the scan KV under `export:`.
pub struct ExportHistory {
    kv: Arc<dyn KVStore>,
}

impl ExportHistory {
    pub fn new(kv: Arc<dyn KVStore>) -> Self {
        Self { kv }
    }

    /// Store a snapshot and return it.
    pub fn save(
        &self,
        name: &str,
        kind: ExportKind,
        mode: ExportMode,
        row_count: usize,
        payload: &[u8],
    ) -> Result<SavedExport, ServiceError> {
        let data = match kind {
            ExportKind::Csv => String::from_utf8(payload.to_vec())
                .map_err(|e| ServiceError::Validation(format!("csv payload is not UTF-8: {}", e)))?,
            ExportKind::Xlsx => STANDARD.encode(payload),
        };
        let saved = SavedExport {
            id: new_id(),
            name: name.to_string(),
            kind,
            mode,
            created_at: now_rfc3339(),
            row_count,
            data,
        };
        let bytes = serde_json::to_vec(&saved)
            .map_err(|e| ServiceError::Internal(format!("serialize: {}", e)))?;
        self.kv
            .set(&export_key(&saved.id), &bytes)
            .map_err(|e| ServiceError::Storage(e.to_string()))?;
        debug!("export saved: {} ({} rows)", saved.name, saved.row_count);
        Ok(saved)
    }

    /// Store the snapshot of a rendered artifact.
    pub fn record(&self, artifact: &ExportArtifact) -> Result<SavedExport, ServiceError> {
        self.save(
            &artifact.file_name,
            artifact.kind,
            artifact.mode,
            artifact.row_count,
            &artifact.bytes,
        )
    }

    /// All snapshots, newest first. Unreadable entries are skipped.
    pub fn list(&self) -> Vec<SavedExport> {
        let entries = match self.kv.scan(EXPORT_PREFIX) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("listing exports failed: {}", e);
                return Vec::new();
            }
        };
        let mut list: Vec<SavedExport> = entries
            .into_iter()
            .filter_map(|(key, bytes)| match serde_json::from_slice(&bytes) {
                Ok(saved) => Some(saved),
                Err(e) => {
                    warn!("undecodable export at {}: {}", key, e);
                    None
                }
            })
            .collect();
        list.sort_by(|a, b| {
            b.created_millis()
                .cmp(&a.created_millis())
                .then_with(|| b.id.cmp(&a.id))
        });
        list
    }

    /// Snapshots whose name contains `query` (case-insensitive), optionally of
    /// one kind only.
    pub fn find(&self, query: &str, kind: Option<ExportKind>) -> Vec<SavedExport> {
        let query = query.trim().to_lowercase();
        self.list()
            .into_iter()
            .filter(|e| query.is_empty() || e.name.to_lowercase().contains(&query))
            .filter(|e| kind.is_none_or(|k| e.kind == k))
            .collect()
    }

    pub fn get(&self, id: &str) -> Result<SavedExport, ServiceError> {
        let bytes = self
            .kv
            .get(&export_key(id))
            .map_err(|e| ServiceError::Storage(e.to_string()))?
            .ok_or_else(|| ServiceError::NotFound(format!("export {} not found", id)))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ServiceError::Internal(format!("deserialize: {}", e)))
    }

    /// Delete a snapshot. Unknown ids are a no-op.
    pub fn delete(&self, id: &str) -> Result<(), ServiceError> {
        self.kv
            .delete(&export_key(id))
            .map_err(|e| ServiceError::Storage(e.to_string()))
    }

    /// The file bytes of a snapshot.
    pub fn decode_payload(export: &SavedExport) -> Result<Vec<u8>, ServiceError> {
        match export.kind {
            ExportKind::Csv => Ok(export.data.clone().into_bytes()),
            ExportKind::Xlsx => STANDARD
                .decode(&export.data)
                .map_err(|e| ServiceError::Internal(format!("export {} payload: {}", export.id, e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use barscan_kv::MemoryStore;

    use super::*;

    fn history() -> (Arc<dyn KVStore>, ExportHistory) {
        let kv: Arc<dyn KVStore> = Arc::new(MemoryStore::new());
        (Arc::clone(&kv), ExportHistory::new(kv))
    }

    #[test]
    fn save_get_and_decode() {
        let (_, history) = history();
        let csv = history
            .save("day1.csv", ExportKind::Csv, ExportMode::Both, 1, b"Serial,IUC\nA,B")
            .unwrap();
        let xlsx = history
            .save("day1.xlsx", ExportKind::Xlsx, ExportMode::Serial, 1, &[0x50, 0x4b, 0, 0xff])
            .unwrap();

        let got = history.get(&csv.id).unwrap();
        assert_eq!(got, csv);
        assert_eq!(ExportHistory::decode_payload(&got).unwrap(), b"Serial,IUC\nA,B");

        let got = history.get(&xlsx.id).unwrap();
        assert_eq!(got.data, "UEsA/w==");
        assert_eq!(ExportHistory::decode_payload(&got).unwrap(), vec![0x50, 0x4b, 0, 0xff]);
    }

    #[test]
    fn json_uses_source_field_names() {
        let (kv, history) = history();
        let saved = history
            .save("a.csv", ExportKind::Csv, ExportMode::Iuc, 3, b"IUC")
            .unwrap();
        let raw = kv.get(&export_key(&saved.id)).unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(json["type"], "csv");
        assert_eq!(json["exportType"], "iuc");
        assert_eq!(json["rowCount"], 3);
        assert!(json["createdAt"].is_string());
    }

    #[test]
    fn list_newest_first_and_find() {
        let (kv, history) = history();
        for (id, name, kind, at) in [
            ("1", "Morning.csv", ExportKind::Csv, "2024-01-01T08:00:00Z"),
            ("2", "evening.xlsx", ExportKind::Xlsx, "2024-01-01T20:00:00Z"),
            ("3", "Morning.xlsx", ExportKind::Xlsx, "2024-01-01T09:30:00.5+00:00"),
        ] {
            let saved = SavedExport {
                id: id.into(),
                name: name.into(),
                kind,
                mode: ExportMode::Both,
                created_at: at.into(),
                row_count: 1,
                data: String::new(),
            };
            kv.set(&export_key(id), &serde_json::to_vec(&saved).unwrap())
                .unwrap();
        }
        kv.set("export:broken", b"{".as_slice()).unwrap();

        let ids: Vec<String> = history.list().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["2", "3", "1"]);

        let ids: Vec<String> = history.find("morning", None).into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["3", "1"]);
        let ids: Vec<String> = history
            .find("MORNING", Some(ExportKind::Csv))
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["1"]);
        assert_eq!(history.find("", Some(ExportKind::Xlsx)).len(), 2);
    }

    #[test]
    fn delete_and_missing() {
        let (_, history) = history();
        let saved = history
            .save("a.csv", ExportKind::Csv, ExportMode::Both, 0, b"x")
            .unwrap();
        history.delete(&saved.id).unwrap();
        history.delete(&saved.id).unwrap();
        assert!(matches!(history.get(&saved.id), Err(ServiceError::NotFound(_))));
        assert!(history.list().is_empty());
    }
}
