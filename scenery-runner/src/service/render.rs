//! Render service
//!
//! Public entry point for front ends. Accepts render requests, makes sure
//! only one engine process is ever in flight, and turns executor results
//! into what the caller needs: a located artifact on success, a parsed
//! diagnostic on failure.
//!
//! Starting a render first cancels and fully joins the previous job, so the
//! most recent request always wins and two engine processes never write into
//! the same media tree.

use scenery_core::domain::config::RenderJobConfig;
use scenery_core::domain::result::{Artifact, RenderOutcome, RenderResult};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tempfile::TempDir;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::RunnerConfig;
use crate::error::{RenderError, Result};
use crate::events::{RenderEvent, RenderEventSink};
use crate::execution::{JobIdentity, RenderHandle, RenderJob};
use crate::scene::{detect_scene_name, is_valid_scene_name};
use crate::service::diagnostics::DiagnosticParser;
use crate::service::executor::{ProcessExecutor, RenderExecutor};
use crate::service::locator::ArtifactLocator;

/// Temporary directories owned by the session
struct SessionDirs {
    scratch: TempDir,
    media: TempDir,
}

/// The job currently occupying the single render slot
struct ActiveJob {
    id: Uuid,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Everything a job task needs after the service call has returned
#[derive(Clone)]
struct JobContext {
    executor: Arc<dyn RenderExecutor>,
    events: Arc<dyn RenderEventSink>,
    locator: ArtifactLocator,
    parser: Arc<DiagnosticParser>,
    last_output: Arc<Mutex<Option<Artifact>>>,
}

impl JobContext {
    async fn run(self, job: RenderJob, cancel: CancellationToken, reply: oneshot::Sender<RenderResult>) {
        let result = self.executor.run(&job, cancel).await;
        let result = self.interpret(&job, result).await;

        self.events.emit(RenderEvent::from_result(&result));

        if reply.send(result).is_err() {
            debug!("Caller dropped the handle for job {}", job.id);
        }
    }

    /// Attaches the artifact or the diagnostic to an executor result
    async fn interpret(&self, job: &RenderJob, result: RenderResult) -> RenderResult {
        match result.outcome {
            RenderOutcome::Succeeded => {
                match self.locate(job).await {
                    Some(artifact) => {
                        *lock(&self.last_output) = Some(artifact.clone());
                        result.with_artifact(artifact)
                    }
                    None => {
                        warn!(
                            "Render job {} succeeded but no output was found under {}",
                            job.id,
                            job.identity.media_dir.display()
                        );
                        result.into_artifact_missing()
                    }
                }
            }
            RenderOutcome::ExitFailure => {
                let hint = job.identity.scene_file.to_string_lossy();
                let diagnostic = self.parser.parse(&result.stderr, Some(&hint));
                debug!("Render job {} diagnostic: {}", job.id, diagnostic.summary);
                result.with_diagnostic(diagnostic)
            }
            _ => result,
        }
    }

    /// Runs the filesystem search off the async workers
    async fn locate(&self, job: &RenderJob) -> Option<Artifact> {
        let locator = self.locator;
        let identity = job.identity.clone();
        let quality = job.config.quality;
        let format = job.config.format.clone();

        match tokio::task::spawn_blocking(move || locator.find(&identity, quality, &format)).await {
            Ok(found) => found,
            Err(e) => {
                warn!("Artifact search for job {} failed: {}", job.id, e);
                None
            }
        }
    }
}

/// Orchestrates render jobs for one application session
pub struct RenderService {
    config: RunnerConfig,
    context: JobContext,
    job_config: RwLock<RenderJobConfig>,
    session: Mutex<Option<SessionDirs>>,
    active: Mutex<Option<ActiveJob>>,
    /// Serialises render/cleanup so cancel-join-start is never interleaved
    slot: tokio::sync::Mutex<()>,
}

impl RenderService {
    /// Creates a render service with its own scratch and media directories
    ///
    /// # Arguments
    /// * `config` - Runner configuration
    /// * `executor` - Executor that runs the engine
    /// * `events` - Sink for job lifecycle events
    pub fn new(
        config: RunnerConfig,
        executor: Arc<dyn RenderExecutor>,
        events: Arc<dyn RenderEventSink>,
    ) -> Result<Self> {
        std::fs::create_dir_all(&config.temp_base)?;

        let scratch = tempfile::Builder::new()
            .prefix("scenery_scratch_")
            .tempdir_in(&config.temp_base)?;
        let media = tempfile::Builder::new()
            .prefix("scenery_media_")
            .tempdir_in(&config.temp_base)?;

        info!(
            "Render session created: scratch={}, media={}",
            scratch.path().display(),
            media.path().display()
        );

        Ok(Self {
            job_config: RwLock::new(config.default_job.clone()),
            config,
            context: JobContext {
                executor,
                events,
                locator: ArtifactLocator::new(),
                parser: Arc::new(DiagnosticParser::default()),
                last_output: Arc::new(Mutex::new(None)),
            },
            session: Mutex::new(Some(SessionDirs { scratch, media })),
            active: Mutex::new(None),
            slot: tokio::sync::Mutex::new(()),
        })
    }

    /// Creates a render service that runs the configured engine command
    pub fn with_process_executor(
        config: RunnerConfig,
        events: Arc<dyn RenderEventSink>,
    ) -> Result<Self> {
        let executor = Arc::new(ProcessExecutor::new(config.clone()));
        Self::new(config, executor, events)
    }

    /// Replaces the stderr parser, e.g. for an engine with other markers
    pub fn with_diagnostic_parser(mut self, parser: DiagnosticParser) -> Self {
        self.context.parser = Arc::new(parser);
        self
    }

    /// Starts rendering `code`
    ///
    /// Any job still running is cancelled and waited out first.
    ///
    /// # Arguments
    /// * `code` - Scene source code
    /// * `scene_name` - Scene to render; detected from the code when `None`
    /// * `config` - Job settings; the service's current settings when `None`
    ///
    /// # Returns
    /// A handle resolving to the job's result. Errors only for problems that
    /// prevent the job from starting.
    pub async fn render(
        &self,
        code: &str,
        scene_name: Option<&str>,
        config: Option<RenderJobConfig>,
    ) -> Result<RenderHandle> {
        let config = config.unwrap_or_else(|| self.config());
        config.validate().map_err(RenderError::InvalidConfig)?;
        let scene_name = self.resolve_scene_name(code, scene_name)?;

        let _slot = self.slot.lock().await;

        let previous = lock(&self.active).take();
        if let Some(previous) = previous {
            stop(previous).await;
        }

        let (scratch_root, media_root) = self.session_paths()?;
        self.prune_finished_jobs(&scratch_root, &media_root).await;

        let job_id = Uuid::new_v4();
        let job_dir = scratch_root.join(job_id.to_string());
        tokio::fs::create_dir_all(&job_dir).await?;

        let scene_file = job_dir.join(format!("{}.py", scene_name));
        tokio::fs::write(&scene_file, code)
            .await
            .map_err(|source| RenderError::ScratchWrite {
                path: scene_file.clone(),
                source,
            })?;

        // A per-job media root keeps a silent engine from "finding" an older
        // job's output for the same scene
        let media_dir = config
            .output_dir
            .clone()
            .unwrap_or_else(|| media_root.join(job_id.to_string()));

        let job = RenderJob {
            id: job_id,
            identity: JobIdentity {
                scene_file,
                scene_name: scene_name.clone(),
                media_dir,
            },
            config,
        };

        info!(
            "Queued render job {} for scene {} ({})",
            job_id,
            scene_name,
            job.identity.scene_file.display()
        );

        self.context.events.emit(RenderEvent::Started {
            job_id,
            scene_name: scene_name.clone(),
        });

        let cancel = CancellationToken::new();
        let (reply, receiver) = oneshot::channel();
        let task = tokio::spawn(self.context.clone().run(job, cancel.clone(), reply));

        *lock(&self.active) = Some(ActiveJob {
            id: job_id,
            cancel: cancel.clone(),
            task,
        });

        Ok(RenderHandle::new(job_id, scene_name, cancel, receiver))
    }

    /// Requests cancellation of the running job, if any
    ///
    /// Returns immediately; the job's handle resolves once the process is
    /// gone. A no-op when idle or when the job has already finished.
    pub fn cancel_current(&self) {
        if let Some(active) = lock(&self.active).as_ref() {
            if !active.task.is_finished() {
                info!("Cancelling render job {}", active.id);
                active.cancel.cancel();
            }
        }
    }

    /// Whether a job currently occupies the render slot
    pub fn is_running(&self) -> bool {
        lock(&self.active)
            .as_ref()
            .map(|active| !active.task.is_finished())
            .unwrap_or(false)
    }

    /// Terminates any running job and removes the session's directories
    ///
    /// Safe to call more than once. Later renders fail with
    /// [`RenderError::ShutDown`].
    pub async fn cleanup(&self) {
        let _slot = self.slot.lock().await;

        let active = lock(&self.active).take();
        if let Some(active) = active {
            stop(active).await;
        }

        let session = lock(&self.session).take();
        let Some(session) = session else {
            debug!("Render session already cleaned up");
            return;
        };

        for dir in [session.scratch, session.media] {
            let path = dir.path().to_path_buf();
            match dir.close() {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }

        info!("Render session cleaned up");
    }

    /// Output of the most recent successful render
    pub fn last_output(&self) -> Option<Artifact> {
        lock(&self.context.last_output).clone()
    }

    /// Settings used by renders that do not pass their own
    pub fn config(&self) -> RenderJobConfig {
        self.job_config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_config(&self, config: RenderJobConfig) {
        *self
            .job_config
            .write()
            .unwrap_or_else(PoisonError::into_inner) = config;
    }

    /// Scratch and media roots, or `None` after cleanup
    pub fn session_dirs(&self) -> Option<(PathBuf, PathBuf)> {
        self.session_paths().ok()
    }

    /// Removes the directories of finished jobs
    ///
    /// Only runs between jobs. The media directory behind `last_output` is
    /// kept so that artifact stays readable.
    async fn prune_finished_jobs(&self, scratch_root: &Path, media_root: &Path) {
        let keep = self.last_output().map(|artifact| artifact.path);

        for root in [scratch_root, media_root] {
            let mut entries = match tokio::fs::read_dir(root).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Cannot list {}: {}", root.display(), e);
                    continue;
                }
            };

            while let Ok(Some(entry)) = entries.next_entry().await {
                let path = entry.path();
                if keep.as_ref().is_some_and(|artifact| artifact.starts_with(&path)) {
                    continue;
                }
                match tokio::fs::remove_dir_all(&path).await {
                    Ok(()) => debug!("Pruned {}", path.display()),
                    Err(e) => warn!("Failed to prune {}: {}", path.display(), e),
                }
            }
        }
    }

    fn session_paths(&self) -> Result<(PathBuf, PathBuf)> {
        lock(&self.session)
            .as_ref()
            .map(|s| (s.scratch.path().to_path_buf(), s.media.path().to_path_buf()))
            .ok_or(RenderError::ShutDown)
    }

    fn resolve_scene_name(&self, code: &str, requested: Option<&str>) -> Result<String> {
        match requested {
            Some(name) if is_valid_scene_name(name) => Ok(name.to_string()),
            Some(name) => Err(RenderError::InvalidSceneName(name.to_string())),
            None => Ok(detect_scene_name(code).unwrap_or_else(|| self.config.default_scene_name.clone())),
        }
    }
}

impl Drop for RenderService {
    fn drop(&mut self) {
        if let Some(active) = lock(&self.active).take() {
            active.cancel.cancel();
            // Dropping the task drops the child, which kills it
            active.task.abort();
        }
    }
}

/// Cancels a job and waits until its task has delivered its result
async fn stop(active: ActiveJob) {
    if !active.task.is_finished() {
        info!("Stopping render job {} before starting a new one", active.id);
    }
    active.cancel.cancel();

    if let Err(e) = active.task.await {
        warn!("Render job {} task ended abnormally: {}", active.id, e);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
