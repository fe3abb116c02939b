//! Line validation for raw scanner/typed input.
//!
//! A line holds a serial and an IUC separated by a comma or whitespace:
//!
//! ```text
//! B987654321X5,4455667788
//! B987654321X5 4455667788
//! ```

use std::sync::LazyLock;

use regex::Regex;

use crate::model::ScanPair;

static SERIAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][0-9]{9}X[0-9]$").expect("serial pattern"));

static IUC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{10}$").expect("IUC pattern"));

/// Result of validating a block of raw input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedBatch {
    /// Valid pairs in input order. May contain repeated serials.
    pub valid: Vec<ScanPair>,
    /// Non-empty lines that failed validation.
    pub invalid: usize,
    /// Non-empty lines seen.
    pub total: usize,
}

impl ParsedBatch {
    pub fn is_empty(&self) -> bool {
        self.valid.is_empty()
    }
}

pub fn is_valid_serial(s: &str) -> bool {
    SERIAL_RE.is_match(s)
}

pub fn is_valid_iuc(s: &str) -> bool {
    IUC_RE.is_match(s)
}

fn is_separator(c: char) -> bool {
    c == ',' || c.is_whitespace()
}

/// Split a line into its serial and IUC candidates.
///
/// Tokens are separated by runs of commas and whitespace. Only the first two
/// count; further tokens (extra QR fields, a trailing note) are ignored.
fn split_line(line: &str) -> (&str, &str) {
    let mut tokens = line.split(is_separator).filter(|t| !t.is_empty());
    (tokens.next().unwrap_or(""), tokens.next().unwrap_or(""))
}

/// Parse one line. `None` if it is not a valid pair.
pub fn parse_line(line: &str) -> Option<ScanPair> {
    let (serial, iuc) = split_line(line.trim());
    if is_valid_serial(serial) && is_valid_iuc(iuc) {
        Some(ScanPair {
            serial: serial.to_string(),
            iuc: iuc.to_string(),
        })
    } else {
        None
    }
}

/// Validate every non-empty line of `text`.
pub fn parse_raw(text: &str) -> ParsedBatch {
    let mut batch = ParsedBatch::default();
    for line in text.split('\n').map(str::trim).filter(|l| !l.is_empty()) {
        batch.total += 1;
        match parse_line(line) {
            Some(pair) => batch.valid.push(pair),
            None => batch.invalid += 1,
        }
    }
    batch
}
