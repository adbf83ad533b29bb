//! Service layer
//!
//! The render service orchestrates jobs. It delegates process supervision to
//! a [`RenderExecutor`], output discovery to the [`ArtifactLocator`] and
//! stderr interpretation to the [`DiagnosticParser`].
//!
//! The executor is trait-based so the service can be tested without an
//! engine installed.

mod diagnostics;
mod executor;
mod locator;
mod render;

// Re-export traits
pub use executor::RenderExecutor;

// Re-export implementations
pub use diagnostics::{parse_stderr, strip_ansi, DiagnosticParser, UNKNOWN_ERROR_SUMMARY};
pub use executor::{merge_path, ProcessExecutor};
pub use locator::{export_artifact, ArtifactLocator, MEDIA_EXTENSIONS};
pub use render::RenderService;
