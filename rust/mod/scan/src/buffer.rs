/// Unparsed text waiting for review.
///
/// Captured payloads and typed text land here one per line until the user
/// commits them to the table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawBuffer {
    text: String,
}

impl RawBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `text` on its own line. Blank input is ignored.
    ///
    /// Returns whether anything was appended.
    pub fn push(&mut self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        if !self.text.is_empty() && !self.text.ends_with('\n') {
            self.text.push('\n');
        }
        self.text.push_str(text);
        true
    }

    /// Replace the whole buffer, as when the user edits it freely.
    pub fn set(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Number of non-blank lines.
    pub fn line_count(&self) -> usize {
        self.text.lines().filter(|l| !l.trim().is_empty()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }
}
