use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use barscan_core::now_millis;

/// Source tag stored on records created by batch ingestion.
pub const SOURCE_FORMAT: &str = "barcode";

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 9;

/// Groups the records created by one ingestion call.
///
/// The value is the wall-clock millis at commit start, bumped past the newest
/// tag already in use so two commits never share one. It is persisted on each
/// record so undo by batch keeps working after a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchTag(pub i64);

impl BatchTag {
    /// A tag for a new commit, strictly greater than `latest`.
    pub fn next_after(latest: Option<BatchTag>) -> Self {
        Self::next_at(now_millis(), latest)
    }

    fn next_at(now: i64, latest: Option<BatchTag>) -> Self {
        match latest {
            Some(BatchTag(prev)) if prev >= now => Self(prev + 1),
            _ => Self(now),
        }
    }

    pub fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for BatchTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One persisted scan, owned by exactly one device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScanRecord {
    /// `scan_<millis>_<random>`, unique across every device in the store.
    pub id: String,

    /// Owning device. Never changes after creation.
    pub device_id: String,

    /// Validated payload, `"<serial>,<iuc>"` for ingested rows.
    pub content: String,

    /// Decoder/source tag, free-form.
    pub format: String,

    /// Creation time, unix millis.
    pub timestamp: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<BatchTag>,
}

impl ScanRecord {
    /// Generate a record id for the given creation time.
    ///
    /// The random suffix keeps ids distinct when many records share a
    /// millisecond.
    pub fn generate_id(timestamp: i64) -> String {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..ID_SUFFIX_LEN)
            .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
            .collect();
        format!("scan_{}_{}", timestamp, suffix)
    }
}

/// A validated `(serial, IUC)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPair {
    pub serial: String,
    pub iuc: String,
}

impl ScanPair {
    /// Canonical stored form.
    pub fn content(&self) -> String {
        format!("{},{}", self.serial, self.iuc)
    }
}

/// The row the UI shows for a record.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanEntry {
    pub id: String,
    pub serial: String,
    pub iuc: String,
    pub timestamp: i64,
    pub device_id: String,
    pub notes: Option<String>,
    pub batch_id: Option<BatchTag>,
}

impl From<&ScanRecord> for ScanEntry {
    fn from(record: &ScanRecord) -> Self {
        let (serial, iuc) = match record.content.split_once(',') {
            Some((serial, rest)) => {
                // Only the second field is the IUC; anything after it is ignored.
                let iuc = rest.split(',').next().unwrap_or_default();
                (serial.to_string(), iuc.to_string())
            }
            None => (record.content.clone(), String::new()),
        };
        Self {
            id: record.id.clone(),
            serial,
            iuc,
            timestamp: record.timestamp,
            device_id: record.device_id.clone(),
            notes: record.notes.clone(),
            batch_id: record.batch_id,
        }
    }
}
