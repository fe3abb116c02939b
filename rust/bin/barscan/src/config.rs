//! Client configuration.
//!
//! Reads `~/.barscan/config.toml`:
//!
//! ```toml
//! [storage]
//! data_dir = "/var/lib/barscan"
//!
//! [export]
//! kind = "xlsx"
//! mode = "both"
//!
//! [capture]
//! cooldown_ms = 4000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use barscan_core::ServiceConfig;
use scan::capture::DEFAULT_COOLDOWN;
use scan::{ExportKind, ExportMode};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_dir: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportSection {
    #[serde(default)]
    pub kind: ExportKind,

    #[serde(default)]
    pub mode: ExportMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSection {
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
}

fn default_cooldown_ms() -> u64 {
    DEFAULT_COOLDOWN.as_millis() as u64
}

impl Default for CaptureSection {
    fn default() -> Self {
        Self {
            cooldown_ms: default_cooldown_ms(),
        }
    }
}

impl CaptureSection {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

/// Client configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub storage: StorageSection,

    #[serde(default)]
    pub export: ExportSection,

    #[serde(default)]
    pub capture: CaptureSection,
}

impl FileConfig {
    /// Default config file path: ~/.barscan/config.toml.
    pub fn default_path() -> PathBuf {
        dirs_path().join("config.toml")
    }

    /// Load config from disk, or return defaults if the file doesn't exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: FileConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("invalid config {}: {}", path.display(), e))?;
        Ok(config)
    }

    /// Storage paths, with flags taking precedence over the file.
    ///
    /// Without any data dir the database lives in `~/.barscan`.
    pub fn service_config(&self, flags: &ServiceConfig) -> ServiceConfig {
        let data_dir = flags
            .data_dir
            .clone()
            .or_else(|| self.storage.data_dir.as_ref().map(PathBuf::from))
            .unwrap_or_else(dirs_path);
        ServiceConfig {
            data_dir: Some(data_dir),
            db_path: flags
                .db_path
                .clone()
                .or_else(|| self.storage.db_path.as_ref().map(PathBuf::from)),
            export_dir: flags
                .export_dir
                .clone()
                .or_else(|| self.storage.export_dir.as_ref().map(PathBuf::from)),
        }
    }
}

fn dirs_path() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".barscan")
}
