//! Render result types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::diagnostic::ParsedError;

/// Terminal state of a render job
///
/// Exactly one of these is reported per job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenderOutcome {
    Succeeded,
    /// The engine could not be launched at all
    SpawnFailed,
    /// The engine exited with a non-zero status
    ExitFailure,
    TimedOut,
    Cancelled,
    /// The engine succeeded but no output file could be located
    ArtifactMissing,
}

impl RenderOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, RenderOutcome::Succeeded)
    }

    /// Whether the failure should be shown to the user as an error.
    /// Cancellation is requested by the user and is not one.
    pub fn is_error(self) -> bool {
        !matches!(self, RenderOutcome::Succeeded | RenderOutcome::Cancelled)
    }
}

/// Kind of media the engine produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactKind {
    Video,
    /// Still frame, written when the scene has no time-based animation
    Image,
}

/// Output file produced by a render job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub kind: ArtifactKind,
}

/// Result of a render job
///
/// Created once when the job terminates, whatever the reason, and handed to
/// the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderResult {
    pub job_id: Uuid,
    pub outcome: RenderOutcome,
    /// Present only on success
    pub artifact: Option<Artifact>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub duration: Duration,
    /// Present only on failure
    pub error_message: Option<String>,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Present only on failure, and only if stderr was interpreted
    pub diagnostic: Option<ParsedError>,
}

impl RenderResult {
    pub fn new(
        job_id: Uuid,
        outcome: RenderOutcome,
        started_at: chrono::DateTime<chrono::Utc>,
        duration: Duration,
    ) -> Self {
        Self {
            job_id,
            outcome,
            artifact: None,
            started_at,
            duration,
            error_message: None,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            diagnostic: None,
        }
    }

    pub fn success(&self) -> bool {
        self.outcome.is_success()
    }

    pub fn with_output(mut self, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self.stderr = stderr.into();
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn with_exit_code(mut self, exit_code: Option<i32>) -> Self {
        self.exit_code = exit_code;
        self
    }

    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifact = Some(artifact);
        self
    }

    pub fn with_diagnostic(mut self, diagnostic: ParsedError) -> Self {
        self.diagnostic = Some(diagnostic);
        self
    }

    /// Downgrades a process-level success whose output could not be found
    pub fn into_artifact_missing(mut self) -> Self {
        self.outcome = RenderOutcome::ArtifactMissing;
        self.artifact = None;
        self.error_message = Some("Render completed but output not found".to_string());
        self
    }

    /// Message to show the user: the diagnostic summary when one exists,
    /// otherwise the error message.
    pub fn display_message(&self) -> Option<&str> {
        self.diagnostic
            .as_ref()
            .map(|d| d.summary.as_str())
            .or(self.error_message.as_deref())
    }
}
