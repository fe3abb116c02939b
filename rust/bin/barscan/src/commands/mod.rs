pub mod capture;
pub mod export;
pub mod scans;

use std::io::{Read, Write};
use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use barscan_core::ServiceConfig;
use barscan_kv::{KVStore, RedbStore};
use scan::{DeviceIdentity, ExportHistory, ScanStore, ScanWorkbench};

use crate::config::FileConfig;

/// Opened storage plus the configuration it came from.
pub struct Session {
    pub file: FileConfig,
    pub service: ServiceConfig,
    pub kv: Arc<dyn KVStore>,
    pub store: Arc<ScanStore>,
}

impl Session {
    pub fn open(file: FileConfig, flags: &ServiceConfig) -> Result<Self> {
        let service = file.service_config(flags);
        let db_path = service.resolve_db_path();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        debug!("opening {}", db_path.display());
        let kv: Arc<dyn KVStore> = Arc::new(
            RedbStore::open(&db_path)
                .map_err(|e| anyhow::anyhow!("cannot open {}: {}", db_path.display(), e))?,
        );
        let identity = Arc::new(DeviceIdentity::new(Arc::clone(&kv)));
        let store = Arc::new(ScanStore::new(Arc::clone(&kv), identity));
        Ok(Self {
            file,
            service,
            kv,
            store,
        })
    }

    pub fn workbench(&self) -> ScanWorkbench {
        ScanWorkbench::open(Arc::clone(&self.store))
    }

    pub fn history(&self) -> ExportHistory {
        ExportHistory::new(Arc::clone(&self.kv))
    }
}

pub fn read_stdin() -> Result<String> {
    let mut text = String::new();
    std::io::stdin().read_to_string(&mut text)?;
    Ok(text)
}

/// Ask a yes/no question on stderr.
pub fn confirm(question: &str) -> Result<bool> {
    eprint!("{} [y/N]: ", question);
    std::io::stderr().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}
