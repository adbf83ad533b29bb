//! Diagnostic parsing
//!
//! Turns the raw stderr of a failed engine run into a `ParsedError`. The
//! engine prints Python tracebacks, possibly several of them and possibly
//! colourised. The last one describes the terminal failure.
//!
//! The line number reported is the one most likely to point at the user's own
//! code: frames in the scratch file win over frames inside installed
//! packages, even when the engine's internals appear later in the traceback
//! because it called back into user code.

use regex::Regex;
use scenery_core::domain::diagnostic::ParsedError;
use std::sync::OnceLock;

/// Summary used when stderr has no meaningful content
pub const UNKNOWN_ERROR_SUMMARY: &str = "Unknown render error";

fn ansi_re() -> &'static Regex {
    static ANSI_RE: OnceLock<Regex> = OnceLock::new();
    ANSI_RE.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*[a-zA-Z]").expect("ansi regex should compile"))
}

fn exception_re() -> &'static Regex {
    static EXCEPTION_RE: OnceLock<Regex> = OnceLock::new();
    EXCEPTION_RE.get_or_init(|| {
        Regex::new(r"^(\w[\w.]*): (.+)$").expect("exception regex should compile")
    })
}

fn frame_re() -> &'static Regex {
    static FRAME_RE: OnceLock<Regex> = OnceLock::new();
    FRAME_RE.get_or_init(|| {
        Regex::new(r#"File "([^"]+)", line (\d+)"#).expect("frame regex should compile")
    })
}

/// Removes ANSI colour and style escape sequences
pub fn strip_ansi(text: &str) -> String {
    ansi_re().replace_all(text, "").into_owned()
}

/// Splits on every line boundary, including the bare `\r` progress bars use
fn split_lines(text: &str) -> impl DoubleEndedIterator<Item = &str> {
    text.split(|c| {
        matches!(
            c,
            '\n' | '\r' | '\x0b' | '\x0c' | '\x1c' | '\x1d' | '\x1e' | '\u{85}' | '\u{2028}' | '\u{2029}'
        )
    })
}

/// A `File "...", line N` reference inside a traceback
#[derive(Debug, Clone, PartialEq, Eq)]
struct Frame<'a> {
    path: &'a str,
    line: u32,
}

/// Stderr parser for one engine's traceback format
///
/// The markers are specific to the engine's output. A different engine needs
/// its own values.
#[derive(Debug, Clone)]
pub struct DiagnosticParser {
    /// Line that opens a traceback block
    pub traceback_marker: String,
    /// Path fragment identifying third-party library frames
    pub library_marker: String,
    /// Maximum length, in characters, of a fallback summary
    pub summary_limit: usize,
}

impl Default for DiagnosticParser {
    fn default() -> Self {
        Self {
            traceback_marker: "Traceback (most recent call last):".to_string(),
            library_marker: "site-packages".to_string(),
            summary_limit: 120,
        }
    }
}

impl DiagnosticParser {
    /// Parses stderr from a failed render
    ///
    /// # Arguments
    /// * `stderr` - Raw stderr, possibly containing ANSI escape codes
    /// * `scene_file_hint` - Path of the scratch file, used to prefer frames
    ///   from the user's own code. An empty hint counts as none.
    pub fn parse(&self, stderr: &str, scene_file_hint: Option<&str>) -> ParsedError {
        let cleaned = strip_ansi(stderr);
        let hint = scene_file_hint.filter(|h| !h.is_empty());

        let mut error_type = None;
        let mut message = None;
        let mut line_number = None;

        if let Some(pos) = cleaned.rfind(&self.traceback_marker) {
            let block = &cleaned[pos..];

            let last_line = split_lines(block).map(str::trim).rev().find(|l| !l.is_empty());
            if let Some(caps) = last_line.and_then(|l| exception_re().captures(l)) {
                error_type = Some(caps[1].to_string());
                message = Some(caps[2].to_string());
            }

            let frames: Vec<Frame<'_>> = split_lines(block)
                .filter_map(|l| frame_re().captures(l))
                .filter_map(|caps| {
                    Some(Frame {
                        path: caps.get(1)?.as_str(),
                        line: caps.get(2)?.as_str().parse().ok()?,
                    })
                })
                .collect();

            line_number = self.pick_line(&frames, hint);
        }

        let summary = match (&error_type, &message, line_number) {
            (Some(ty), Some(msg), Some(line)) => format!("{} on line {}: {}", ty, line, msg),
            (Some(ty), Some(msg), None) => format!("{}: {}", ty, msg),
            _ => self.fallback_summary(&cleaned),
        };

        ParsedError {
            error_type,
            message,
            line_number,
            cleaned_text: cleaned,
            summary,
        }
    }

    fn is_library_path(&self, path: &str) -> bool {
        path.contains(&self.library_marker)
    }

    /// Picks the frame most likely to belong to the user
    ///
    /// Order: last frame in the hinted file outside libraries, then the last
    /// frame outside libraries, then the last frame of all.
    fn pick_line(&self, frames: &[Frame<'_>], hint: Option<&str>) -> Option<u32> {
        let user_frame = hint.and_then(|hint| {
            frames
                .iter()
                .rev()
                .find(|f| f.path.contains(hint) && !self.is_library_path(f.path))
        });

        user_frame
            .or_else(|| frames.iter().rev().find(|f| !self.is_library_path(f.path)))
            .or_else(|| frames.last())
            .map(|f| f.line)
    }

    fn fallback_summary(&self, cleaned: &str) -> String {
        split_lines(cleaned)
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(|l| l.chars().take(self.summary_limit).collect())
            .unwrap_or_else(|| UNKNOWN_ERROR_SUMMARY.to_string())
    }
}

/// Parses stderr using the default Python traceback format
pub fn parse_stderr(stderr: &str, scene_file_hint: Option<&str>) -> ParsedError {
    DiagnosticParser::default().parse(stderr, scene_file_hint)
}
