//! Error types for the render runner
//!
//! Render outcomes (failures, timeouts, cancellations) are never errors: they
//! are reported through `RenderResult`. These variants cover the environment
//! problems that keep a job from being started at all.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for runner operations
pub type Result<T> = std::result::Result<T, RenderError>;

/// Errors raised by the render service itself
#[derive(Debug, Error)]
pub enum RenderError {
    /// Temporary directory or other filesystem setup failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The scratch source file could not be written
    #[error("Failed to write scratch file {path}: {source}")]
    ScratchWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Caller supplied a render target that cannot be used as a file stem
    #[error("Invalid scene name '{0}'")]
    InvalidSceneName(String),

    /// Job settings failed validation
    #[error("Invalid render config: {0}")]
    InvalidConfig(String),

    /// The service was cleaned up and no longer accepts renders
    #[error("Render service has been shut down")]
    ShutDown,

    /// The task supervising a job died without reporting a result
    #[error("Render task failed: {0}")]
    JobPanicked(String),
}
