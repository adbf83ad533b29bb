//! Scenery Runner
//!
//! Runs an external animation engine on generated scene code and reports
//! exactly one result per job.
//!
//! Architecture:
//! - Configuration: engine command, tool lookup and supervision timings
//! - Scene: scene name detection and validation
//! - Execution: in-flight job types and the caller's handle
//! - Services: the render service plus its executor, locator and parser
//! - Events: pluggable sinks for job lifecycle notifications
//!
//! A session creates its own scratch and media directories, renders at most
//! one job at a time, and removes everything it created on cleanup.

pub mod config;
pub mod error;
pub mod events;
pub mod execution;
pub mod scene;
pub mod service;

pub use config::RunnerConfig;
pub use error::{RenderError, Result};
pub use events::{ChannelEventSink, NoopEventSink, RenderEvent, RenderEventSink, TracingEventSink};
pub use execution::{JobIdentity, RenderHandle, RenderJob};
pub use service::{ArtifactLocator, DiagnosticParser, ProcessExecutor, RenderExecutor, RenderService};
