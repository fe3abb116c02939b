use std::path::PathBuf;

/// Storage locations shared by every front end.
///
/// The binary fills this from its TOML file and command-line flags, then
/// hands the resolved paths to the storage layer.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    /// Directory holding the database and exported files.
    pub data_dir: Option<PathBuf>,

    /// Path to the redb database file.
    /// Defaults to `{data_dir}/scans.redb` if not specified.
    pub db_path: Option<PathBuf>,

    /// Directory exported CSV/XLSX files are written to.
    /// Defaults to `{data_dir}/exports/` if not specified.
    pub export_dir: Option<PathBuf>,
}

impl ServiceConfig {
    /// Resolve the redb database path, falling back to `{data_dir}/scans.redb`.
    pub fn resolve_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| self.resolve_data_subpath("scans.redb"))
    }

    /// Resolve the export directory.
    pub fn resolve_export_dir(&self) -> PathBuf {
        self.export_dir
            .clone()
            .unwrap_or_else(|| self.resolve_data_subpath("exports"))
    }

    fn resolve_data_subpath(&self, name: &str) -> PathBuf {
        self.data_dir
            .as_ref()
            .map(|d| d.join(name))
            .unwrap_or_else(|| PathBuf::from(name))
    }
}
