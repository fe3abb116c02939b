use std::collections::HashSet;

use barscan_core::ServiceError;
use tracing::{debug, warn};

use crate::model::{BatchTag, ScanEntry, ScanPair, SOURCE_FORMAT};
use crate::store::ScanStore;

/// What one commit of the raw buffer did.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub batch: BatchTag,
    /// Rows persisted.
    pub added: usize,
    /// Valid rows whose serial was already present.
    pub skipped: usize,
    /// Non-empty lines that failed validation.
    pub invalid: usize,
    /// Non-empty lines seen.
    pub total: usize,
    /// The persisted rows, newest first.
    pub entries: Vec<ScanEntry>,
}

/// Result of [`commit_batch`]. `entries` holds whatever was persisted, even
/// when `failure` is set.
pub(crate) struct Commit {
    pub entries: Vec<ScanEntry>,
    pub skipped: usize,
    pub failure: Option<ServiceError>,
}

/// Persist `pairs` under `tag`, skipping serials in `known` and serials seen
/// earlier in `pairs`.
///
/// Stops at the first write failure.
pub(crate) fn commit_batch(
    store: &ScanStore,
    mut known: HashSet<String>,
    pairs: &[ScanPair],
    tag: BatchTag,
) -> Commit {
    let mut added = Vec::with_capacity(pairs.len());
    let mut skipped = 0;

    for pair in pairs {
        if !known.insert(pair.serial.clone()) {
            debug!("duplicate serial skipped: {}", pair.serial);
            skipped += 1;
            continue;
        }
        match store.save_scan_in_batch(&pair.content(), SOURCE_FORMAT, None, tag) {
            Ok(record) => added.push(ScanEntry::from(&record)),
            Err(e) => {
                warn!(
                    "batch {} stopped after {} rows: {}",
                    tag,
                    added.len(),
                    e
                );
                added.reverse();
                return Commit {
                    entries: added,
                    skipped,
                    failure: Some(e),
                };
            }
        }
    }

    added.reverse();
    Commit {
        entries: added,
        skipped,
        failure: None,
    }
}
