//! Spreadsheet and CSV export of the table.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone};
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use barscan_core::now_millis;

use crate::model::ScanEntry;

pub const SHEET_NAME: &str = "Scans";
const COLUMN_WIDTH: f64 = 13.0;
const FILE_STEM: &str = "Tonnex_Scan";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no scans to export")]
    Empty,

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("xlsx error: {0}")]
    Xlsx(#[from] XlsxError),

    #[error("encoding error: {0}")]
    Encoding(String),
}

/// Which columns to write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportMode {
    Serial,
    Iuc,
    #[default]
    Both,
}

impl ExportMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ExportMode::Serial => "serial",
            ExportMode::Iuc => "iuc",
            ExportMode::Both => "both",
        }
    }

    pub fn headers(self) -> &'static [&'static str] {
        match self {
            ExportMode::Serial => &["Serial"],
            ExportMode::Iuc => &["IUC"],
            ExportMode::Both => &["Serial", "IUC"],
        }
    }

    fn row(self, entry: &ScanEntry) -> Vec<&str> {
        match self {
            ExportMode::Serial => vec![entry.serial.as_str()],
            ExportMode::Iuc => vec![entry.iuc.as_str()],
            ExportMode::Both => vec![entry.serial.as_str(), entry.iuc.as_str()],
        }
    }
}

impl fmt::Display for ExportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ExportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "serial" => Ok(ExportMode::Serial),
            "iuc" => Ok(ExportMode::Iuc),
            "both" => Ok(ExportMode::Both),
            other => Err(format!("unknown export mode: {}", other)),
        }
    }
}

/// Output file format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    Csv,
    #[default]
    Xlsx,
}

impl ExportKind {
    pub fn extension(self) -> &'static str {
        match self {
            ExportKind::Csv => "csv",
            ExportKind::Xlsx => "xlsx",
        }
    }
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.extension())
    }
}

impl FromStr for ExportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportKind::Csv),
            "xlsx" | "excel" => Ok(ExportKind::Xlsx),
            other => Err(format!("unknown export kind: {}", other)),
        }
    }
}

/// CSV text with one header line and one line per entry, `\n` separated.
pub fn to_csv(entries: &[ScanEntry], mode: ExportMode) -> Result<String, ExportError> {
    if entries.is_empty() {
        return Err(ExportError::Empty);
    }
    let mut wtr = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    wtr.write_record(mode.headers())?;
    for entry in entries {
        wtr.write_record(mode.row(entry))?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| ExportError::Encoding(e.to_string()))?;
    let mut text = String::from_utf8(bytes).map_err(|e| ExportError::Encoding(e.to_string()))?;
    // No newline after the last row.
    if text.ends_with('\n') {
        text.pop();
    }
    Ok(text)
}

/// An XLSX workbook with a single `Scans` sheet.
pub fn to_xlsx(entries: &[ScanEntry], mode: ExportMode) -> Result<Vec<u8>, ExportError> {
    if entries.is_empty() {
        return Err(ExportError::Empty);
    }
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, header) in mode.headers().iter().enumerate() {
        let col = col as u16;
        sheet.set_column_width(col, COLUMN_WIDTH)?;
        sheet.write_string_with_format(0, col, *header, &header_format)?;
    }
    for (i, entry) in entries.iter().enumerate() {
        let row = (i + 1) as u32;
        for (col, value) in mode.row(entry).into_iter().enumerate() {
            sheet.write_string(row, col as u16, value)?;
        }
    }

    Ok(workbook.save_to_buffer()?)
}

/// Default file stem offered for an export made at `now`.
pub fn suggested_file_name<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: fmt::Display,
{
    format!("{}_{}", FILE_STEM, now.format("%Y-%m-%d_%H-%M-%S"))
}

/// Replace every character outside `[A-Za-z0-9_-]` with `_`.
///
/// An empty name becomes `Tonnex_Scan_<millis>`.
pub fn sanitize_file_name(name: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        return format!("{}_{}", FILE_STEM, now_millis());
    }
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// A rendered export, ready to be written to disk or saved to history.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportArtifact {
    /// Sanitized name including the extension.
    pub file_name: String,
    pub kind: ExportKind,
    pub mode: ExportMode,
    pub row_count: usize,
    pub bytes: Vec<u8>,
}

impl ExportArtifact {
    /// Render `entries`. `name` is the user's file stem; `None` or blank gets
    /// a timestamped default.
    pub fn build(
        entries: &[ScanEntry],
        kind: ExportKind,
        mode: ExportMode,
        name: Option<&str>,
    ) -> Result<Self, ExportError> {
        let bytes = match kind {
            ExportKind::Csv => to_csv(entries, mode)?.into_bytes(),
            ExportKind::Xlsx => to_xlsx(entries, mode)?,
        };
        let stem = sanitize_file_name(name.unwrap_or_default());
        Ok(Self {
            file_name: format!("{}.{}", stem, kind.extension()),
            kind,
            mode,
            row_count: entries.len(),
            bytes,
        })
    }
}
