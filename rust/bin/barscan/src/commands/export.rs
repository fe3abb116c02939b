//! Export commands.

use std::path::PathBuf;

use anyhow::Result;
use chrono::Local;

use scan::export::suggested_file_name;
use scan::{ExportHistory, ExportKind, ExportMode};

use super::Session;

#[derive(Debug, Default)]
pub struct ExportRequest {
    pub kind: Option<ExportKind>,
    pub mode: Option<ExportMode>,
    pub name: Option<String>,
    pub out: Option<PathBuf>,
    pub save: bool,
}

/// Write the table to a file in the export directory.
pub fn export(session: &Session, req: ExportRequest) -> Result<()> {
    let path = write_export(session, req)?;
    println!("Exported to {}", path.display());
    Ok(())
}

/// Returns the written path.
fn write_export(session: &Session, req: ExportRequest) -> Result<PathBuf> {
    let bench = session.workbench();
    let kind = req.kind.unwrap_or(session.file.export.kind);
    let mode = req.mode.unwrap_or(session.file.export.mode);
    let name = req
        .name
        .unwrap_or_else(|| suggested_file_name(&Local::now()));

    let artifact = bench.export(kind, mode, Some(name.as_str()))?;
    let dir = req
        .out
        .unwrap_or_else(|| session.service.resolve_export_dir());
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(&artifact.file_name);
    std::fs::write(&path, &artifact.bytes)?;

    if req.save {
        session.history().record(&artifact)?;
    }
    tracing::info!("{} rows written to {}", artifact.row_count, path.display());
    Ok(path)
}

pub fn list(session: &Session, query: Option<&str>, kind: Option<ExportKind>) -> Result<()> {
    let exports = session.history().find(query.unwrap_or(""), kind);
    if exports.is_empty() {
        println!("No saved exports.");
        return Ok(());
    }
    println!(
        "{:<32}  {:<36}  {:<4}  {:<6}  {:>6}  CREATED",
        "ID", "NAME", "TYPE", "MODE", "ROWS"
    );
    for e in &exports {
        println!(
            "{:<32}  {:<36}  {:<4}  {:<6}  {:>6}  {}",
            e.id, e.name, e.kind, e.mode, e.row_count, e.created_at
        );
    }
    Ok(())
}

pub fn save(session: &Session, id: &str, out: Option<PathBuf>) -> Result<()> {
    let saved = session.history().get(id)?;
    let bytes = ExportHistory::decode_payload(&saved)?;
    let dir = out.unwrap_or_else(|| session.service.resolve_export_dir());
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(&saved.name);
    std::fs::write(&path, bytes)?;
    println!("Wrote {}", path.display());
    Ok(())
}

pub fn delete(session: &Session, id: &str) -> Result<()> {
    session.history().delete(id)?;
    println!("Deleted export {}.", id);
    Ok(())
}
