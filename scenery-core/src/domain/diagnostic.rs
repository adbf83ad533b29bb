//! Diagnostic domain types

use serde::{Deserialize, Serialize};

/// Structured interpretation of a failed render's stderr
///
/// Always produced on a best-effort basis: when no traceback is recognised
/// every optional field is `None` and `summary` falls back to the first
/// meaningful line of the cleaned text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedError {
    /// Exception type name, e.g. `NameError`
    pub error_type: Option<String>,
    pub message: Option<String>,
    /// 1-based line in the user's scene file
    pub line_number: Option<u32>,
    /// Full stderr with ANSI escape sequences removed
    pub cleaned_text: String,
    /// One-liner suitable for an overlay or status bar
    pub summary: String,
}

impl ParsedError {
    /// Whether a traceback exception line was recognised
    pub fn has_exception(&self) -> bool {
        self.error_type.is_some() && self.message.is_some()
    }
}
