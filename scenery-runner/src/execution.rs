//! Execution types for the render runner
//!
//! These types only exist while a job is in flight. They are not persisted.

use scenery_core::domain::config::RenderJobConfig;
use scenery_core::domain::result::RenderResult;
use std::path::PathBuf;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{RenderError, Result};

/// Identity of one render job
///
/// The engine derives its output layout from these three values, so they are
/// exactly what the artifact locator needs. Fresh per render call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobIdentity {
    /// Scratch source file handed to the engine
    pub scene_file: PathBuf,
    /// Scene class the engine should render
    pub scene_name: String,
    /// Root the engine writes `videos/` and `images/` under
    pub media_dir: PathBuf,
}

impl JobIdentity {
    /// File stem the engine uses for its per-file output directory
    pub fn scene_file_stem(&self) -> String {
        self.scene_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// A render job ready to hand to an executor
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub id: Uuid,
    pub identity: JobIdentity,
    pub config: RenderJobConfig,
}

/// Caller's view of a started render
///
/// Resolves to the job's single `RenderResult`.
#[derive(Debug)]
pub struct RenderHandle {
    job_id: Uuid,
    scene_name: String,
    cancel: CancellationToken,
    receiver: oneshot::Receiver<RenderResult>,
}

impl RenderHandle {
    pub(crate) fn new(
        job_id: Uuid,
        scene_name: String,
        cancel: CancellationToken,
        receiver: oneshot::Receiver<RenderResult>,
    ) -> Self {
        Self {
            job_id,
            scene_name,
            cancel,
            receiver,
        }
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn scene_name(&self) -> &str {
        &self.scene_name
    }

    /// Requests cancellation of this job; a no-op once it has finished
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the job's result without blocking the caller's thread
    pub async fn wait(self) -> Result<RenderResult> {
        self.receiver.await.map_err(|_| {
            RenderError::JobPanicked(format!("job {} ended without a result", self.job_id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenery_core::domain::result::RenderOutcome;
    use std::time::Duration;

    #[test]
    fn test_scene_file_stem() {
        let identity = JobIdentity {
            scene_file: PathBuf::from("/tmp/scratch/abc/CircleDemo.py"),
            scene_name: "CircleDemo".to_string(),
            media_dir: PathBuf::from("/tmp/media"),
        };
        assert_eq!(identity.scene_file_stem(), "CircleDemo");
    }

    #[tokio::test]
    async fn test_handle_receives_result() {
        let (tx, rx) = oneshot::channel();
        let job_id = Uuid::new_v4();
        let handle = RenderHandle::new(job_id, "S".to_string(), CancellationToken::new(), rx);

        let result = RenderResult::new(
            job_id,
            RenderOutcome::Succeeded,
            chrono::Utc::now(),
            Duration::ZERO,
        );
        tx.send(result).unwrap();

        let received = handle.wait().await.unwrap();
        assert_eq!(received.job_id, job_id);
    }

    #[tokio::test]
    async fn test_handle_reports_dropped_sender() {
        let (tx, rx) = oneshot::channel::<RenderResult>();
        let handle = RenderHandle::new(Uuid::new_v4(), "S".to_string(), CancellationToken::new(), rx);
        drop(tx);

        assert!(matches!(handle.wait().await, Err(RenderError::JobPanicked(_))));
    }
}
