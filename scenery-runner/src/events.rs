//! Render event sinks
//!
//! The render service reports job lifecycle changes to whichever sink it was
//! constructed with. Front ends pick the sink that fits them: a channel for a
//! UI event loop, tracing output for a CLI, or nothing at all.

use scenery_core::domain::diagnostic::ParsedError;
use scenery_core::domain::result::{Artifact, RenderOutcome, RenderResult};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Lifecycle event for a render job
#[derive(Debug, Clone)]
pub enum RenderEvent {
    Started {
        job_id: Uuid,
        scene_name: String,
    },
    Finished {
        job_id: Uuid,
        artifact: Artifact,
    },
    Failed {
        job_id: Uuid,
        outcome: RenderOutcome,
        message: String,
        diagnostic: Option<ParsedError>,
    },
}

impl RenderEvent {
    /// Builds the terminal event for a finished job
    pub fn from_result(result: &RenderResult) -> Self {
        match (&result.outcome, &result.artifact) {
            (RenderOutcome::Succeeded, Some(artifact)) => RenderEvent::Finished {
                job_id: result.job_id,
                artifact: artifact.clone(),
            },
            _ => RenderEvent::Failed {
                job_id: result.job_id,
                outcome: result.outcome,
                message: result
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "Unknown render error".to_string()),
                diagnostic: result.diagnostic.clone(),
            },
        }
    }

    pub fn job_id(&self) -> Uuid {
        match self {
            RenderEvent::Started { job_id, .. }
            | RenderEvent::Finished { job_id, .. }
            | RenderEvent::Failed { job_id, .. } => *job_id,
        }
    }
}

/// Receiver of render lifecycle events
pub trait RenderEventSink: Send + Sync {
    fn emit(&self, event: RenderEvent);
}

/// Sink that discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

impl RenderEventSink for NoopEventSink {
    fn emit(&self, _event: RenderEvent) {}
}

/// Sink that writes events to the tracing subscriber
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl RenderEventSink for TracingEventSink {
    fn emit(&self, event: RenderEvent) {
        match event {
            RenderEvent::Started { job_id, scene_name } => {
                info!("Render {} started for scene {}", job_id, scene_name);
            }
            RenderEvent::Finished { job_id, artifact } => {
                info!(
                    "Render {} produced {:?} at {}",
                    job_id,
                    artifact.kind,
                    artifact.path.display()
                );
            }
            RenderEvent::Failed {
                job_id,
                outcome,
                message,
                diagnostic,
            } => {
                let summary = diagnostic.map(|d| d.summary).unwrap_or(message);
                warn!("Render {} ended as {:?}: {}", job_id, outcome, summary);
            }
        }
    }
}

/// Sink that forwards events over an unbounded channel
///
/// Sending never blocks; events are dropped once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    sender: mpsc::UnboundedSender<RenderEvent>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RenderEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl RenderEventSink for ChannelEventSink {
    fn emit(&self, event: RenderEvent) {
        let _ = self.sender.send(event);
    }
}
