//! Render executor
//!
//! Owns the engine process for one in-flight job:
//! - Building the engine command line from the job config
//! - Making the auxiliary toolchain discoverable on the child's PATH
//! - Capturing stdout/stderr
//! - Enforcing the wall-clock budget and honouring cancellation
//!
//! Every outcome, including a failure to launch, is reported as a
//! `RenderResult`. Nothing is retried.

use async_trait::async_trait;
use scenery_core::domain::result::{RenderOutcome, RenderResult};
use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::RunnerConfig;
use crate::execution::RenderJob;

/// Executes render jobs
///
/// Implementations run on the caller's async runtime but must never block
/// it; the supervising work happens inside `run`.
#[async_trait]
pub trait RenderExecutor: Send + Sync {
    /// Runs one job to completion
    ///
    /// # Arguments
    /// * `job` - The job to render
    /// * `cancel` - Cancelled by the render service to stop the job early
    ///
    /// # Returns
    /// The job's terminal result, with no artifact attached
    async fn run(&self, job: &RenderJob, cancel: CancellationToken) -> RenderResult;
}

/// How the supervised wait ended
enum Termination {
    Exited(std::io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

/// Executor that launches the engine as an operating-system process
pub struct ProcessExecutor {
    config: RunnerConfig,
}

impl ProcessExecutor {
    /// Creates a new process executor
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Arguments passed to the engine program, in order
    pub fn build_args(&self, job: &RenderJob) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.config.engine_args.iter().map(OsString::from).collect();

        args.push("render".into());
        args.push(job.identity.scene_file.clone().into_os_string());
        args.push(job.identity.scene_name.clone().into());
        args.push(format!("-q{}", job.config.quality.flag()).into());
        args.push("--format".into());
        args.push(job.config.format.clone().into());
        args.push("--media_dir".into());
        args.push(job.identity.media_dir.clone().into_os_string());

        if job.config.disable_caching {
            args.push("--disable_caching".into());
        }

        args
    }

    fn build_command(&self, job: &RenderJob) -> Command {
        let mut command = Command::new(&self.config.engine_program);
        command
            .args(self.build_args(job))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &self.config.aux_tool_dir {
            let current = std::env::var_os("PATH");
            command.env("PATH", merge_path(current.as_deref(), dir));
        }

        // Own process group so termination reaches the engine's children too
        #[cfg(unix)]
        command.process_group(0);

        command
    }

    /// Asks the process to stop, then kills it after the grace window
    async fn terminate(&self, child: &mut Child, group: Option<u32>) {
        #[cfg(unix)]
        let asked = signal_group(group, libc::SIGTERM);
        #[cfg(not(unix))]
        let asked = {
            let _ = group;
            false
        };

        if asked {
            match tokio::time::timeout(self.config.cancel_grace, child.wait()).await {
                Ok(_) => return,
                Err(_) => {
                    warn!(
                        "Process did not exit within {:?} of SIGTERM, killing it",
                        self.config.cancel_grace
                    );
                }
            }
        }

        kill(child, group).await;
    }

    fn finish(
        &self,
        job: &RenderJob,
        termination: Termination,
        started_at: chrono::DateTime<chrono::Utc>,
        duration: Duration,
    ) -> RenderResult {
        match termination {
            Termination::Exited(Ok(status)) if status.success() => {
                RenderResult::new(job.id, RenderOutcome::Succeeded, started_at, duration)
                    .with_exit_code(status.code())
            }
            Termination::Exited(Ok(status)) => {
                RenderResult::new(job.id, RenderOutcome::ExitFailure, started_at, duration)
                    .with_exit_code(status.code())
                    .with_error(self.exit_message(status))
            }
            Termination::Exited(Err(e)) => {
                RenderResult::new(job.id, RenderOutcome::SpawnFailed, started_at, duration)
                    .with_error(format!("Render exception: {}", e))
            }
            Termination::TimedOut => {
                RenderResult::new(job.id, RenderOutcome::TimedOut, started_at, duration).with_error(
                    format!("Render timed out after {} seconds", job.config.timeout_secs),
                )
            }
            Termination::Cancelled => {
                RenderResult::new(job.id, RenderOutcome::Cancelled, started_at, duration)
                    .with_error("Render cancelled by user")
            }
        }
    }

    fn exit_message(&self, status: ExitStatus) -> String {
        if let Some(code) = status.code() {
            return format!("{} render failed with code {}", self.config.engine_name, code);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return format!(
                    "{} render terminated by signal {}",
                    self.config.engine_name, signal
                );
            }
        }

        format!("{} render failed", self.config.engine_name)
    }
}

#[async_trait]
impl RenderExecutor for ProcessExecutor {
    async fn run(&self, job: &RenderJob, cancel: CancellationToken) -> RenderResult {
        let started_at = chrono::Utc::now();
        let start = Instant::now();

        info!(
            "Starting render job {}: scene {} at {} quality",
            job.id, job.identity.scene_name, job.config.quality
        );
        debug!(
            "Command: {} {:?}",
            self.config.engine_program,
            self.build_args(job)
        );

        let mut child = match self.build_command(job).spawn() {
            Ok(child) => child,
            Err(e) => {
                error!(
                    "Failed to launch '{}' for job {}: {}",
                    self.config.engine_program, job.id, e
                );
                return RenderResult::new(
                    job.id,
                    RenderOutcome::SpawnFailed,
                    started_at,
                    start.elapsed(),
                )
                .with_error(format!("Render exception: {}", e))
                .with_output("", e.to_string());
            }
        };

        // Captured before waiting: a reaped child no longer reports its id
        let group = child.id();
        let stdout_reader = OutputReader::spawn(child.stdout.take());
        let stderr_reader = OutputReader::spawn(child.stderr.take());

        let termination = tokio::select! {
            biased;
            status = child.wait() => Termination::Exited(status),
            _ = tokio::time::sleep(job.config.timeout()) => Termination::TimedOut,
            _ = cancel.cancelled() => Termination::Cancelled,
        };

        match termination {
            Termination::TimedOut => {
                warn!(
                    "Render job {} exceeded {} seconds, killing it",
                    job.id, job.config.timeout_secs
                );
                kill(&mut child, group).await;
            }
            Termination::Cancelled => {
                info!("Render job {} cancelled, terminating process", job.id);
                self.terminate(&mut child, group).await;
            }
            Termination::Exited(_) => {}
        }

        // Descendants left in the group would hold the pipes open and keep
        // writing into the media tree
        #[cfg(unix)]
        if signal_group(group, libc::SIGKILL) {
            debug!("Killed processes left behind by render job {}", job.id);
        }

        let stdout = stdout_reader.drain(self.config.drain_timeout, "stdout").await;
        let stderr = stderr_reader.drain(self.config.drain_timeout, "stderr").await;

        debug!(
            "Render job {} output: stdout_len={}, stderr_len={}",
            job.id,
            stdout.len(),
            stderr.len()
        );

        let result = self
            .finish(job, termination, started_at, start.elapsed())
            .with_output(stdout, stderr);

        info!(
            "Render job {} finished as {:?} in {:.2}s",
            job.id,
            result.outcome,
            result.duration.as_secs_f64()
        );

        result
    }
}

/// Prepends `dir` to a PATH value unless it is already one of its entries
///
/// Existing entries are kept in order. If the joined value cannot be
/// represented (e.g., `dir` contains the separator) the original is returned.
pub fn merge_path(current: Option<&OsStr>, dir: &Path) -> OsString {
    let existing: Vec<_> = current.map(|p| std::env::split_paths(p).collect()).unwrap_or_default();

    if existing.iter().any(|entry| entry == dir) {
        return current.map(OsStr::to_os_string).unwrap_or_default();
    }

    let merged = std::iter::once(dir.to_path_buf()).chain(existing);
    match std::env::join_paths(merged) {
        Ok(path) => path,
        Err(e) => {
            warn!("Cannot add {} to PATH: {}", dir.display(), e);
            current.map(OsStr::to_os_string).unwrap_or_default()
        }
    }
}

/// Sends `signal` to the process group led by the engine process
///
/// The group outlives its leader while descendants remain in it. Returns
/// `false` if the group is empty or the signal failed.
#[cfg(unix)]
fn signal_group(group: Option<u32>, signal: libc::c_int) -> bool {
    let Some(pid) = group else {
        return false;
    };
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };

    // SAFETY: kill(2) has no memory-safety preconditions. The group was
    // created for this child by `process_group(0)`.
    unsafe { libc::kill(-pid, signal) == 0 }
}

/// Forcibly kills the child (and its group) and reaps it
async fn kill(child: &mut Child, group: Option<u32>) {
    #[cfg(unix)]
    signal_group(group, libc::SIGKILL);
    #[cfg(not(unix))]
    let _ = group;

    if let Err(e) = child.start_kill() {
        debug!("start_kill after group kill: {}", e);
    }

    if let Err(e) = child.wait().await {
        warn!("Failed to reap killed render process: {}", e);
    }
}

/// Background reader collecting one output stream
///
/// Bytes are appended to a shared buffer as they arrive, so whatever was read
/// survives a drain that gives up early.
struct OutputReader {
    buffer: Arc<Mutex<Vec<u8>>>,
    task: JoinHandle<()>,
}

impl OutputReader {
    fn spawn<R>(stream: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = buffer.clone();

        let task = tokio::spawn(async move {
            let Some(mut stream) = stream else {
                return;
            };

            let mut chunk = [0u8; 8192];
            loop {
                match stream.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => sink
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .extend_from_slice(&chunk[..n]),
                    Err(e) => {
                        debug!("Stopped reading render output: {}", e);
                        break;
                    }
                }
            }
        });

        Self { buffer, task }
    }

    /// Waits for EOF for at most `window`, then returns what was read
    async fn drain(mut self, window: Duration, name: &str) -> String {
        match tokio::time::timeout(window, &mut self.task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Reader for {} failed: {}", name, e),
            Err(_) => {
                warn!(
                    "{} still open {:?} after process exit, keeping partial output",
                    name, window
                );
                self.task.abort();
            }
        }

        let bytes = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::JobIdentity;
    use scenery_core::domain::config::{Quality, RenderJobConfig};
    use std::path::PathBuf;
    use uuid::Uuid;

    fn job(config: RenderJobConfig) -> RenderJob {
        RenderJob {
            id: Uuid::new_v4(),
            identity: JobIdentity {
                scene_file: PathBuf::from("/tmp/scratch/Demo.py"),
                scene_name: "Demo".to_string(),
                media_dir: PathBuf::from("/tmp/media"),
            },
            config,
        }
    }

    /// Executor whose engine is a shell script; the render arguments land in
    /// the script's positional parameters.
    fn shell_executor(script: &str) -> ProcessExecutor {
        let config = RunnerConfig::new("sh", vec!["-c".to_string(), script.to_string(), "sh".to_string()])
            .with_aux_tool_dir(None)
            .with_cancel_grace(Duration::from_millis(500));
        ProcessExecutor::new(config)
    }

    #[test]
    fn test_build_args() {
        let executor = ProcessExecutor::new(RunnerConfig::default());
        let args = executor.build_args(&job(RenderJobConfig::default().with_quality(Quality::Ultra)));
        let args: Vec<_> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();

        assert_eq!(
            args,
            vec![
                "-m",
                "manim",
                "render",
                "/tmp/scratch/Demo.py",
                "Demo",
                "-qk",
                "--format",
                "mp4",
                "--media_dir",
                "/tmp/media",
                "--disable_caching",
            ]
        );

        let args = executor.build_args(&job(RenderJobConfig::default().with_caching(true)));
        assert!(!args.iter().any(|a| a == "--disable_caching"));
    }

    #[test]
    fn test_merge_path_prepends_missing_dir() {
        let merged = merge_path(Some(OsStr::new("/usr/bin:/bin")), Path::new("/opt/tex"));
        assert_eq!(merged, OsString::from("/opt/tex:/usr/bin:/bin"));
    }

    #[test]
    fn test_merge_path_keeps_existing() {
        let merged = merge_path(Some(OsStr::new("/usr/bin:/opt/tex")), Path::new("/opt/tex"));
        assert_eq!(merged, OsString::from("/usr/bin:/opt/tex"));

        let merged = merge_path(None, Path::new("/opt/tex"));
        assert_eq!(merged, OsString::from("/opt/tex"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_success_captures_output() {
        let executor = shell_executor("echo \"rendering $2\"; echo warn >&2; exit 0");
        let result = executor
            .run(&job(RenderJobConfig::default()), CancellationToken::new())
            .await;

        assert_eq!(result.outcome, RenderOutcome::Succeeded);
        assert!(result.success());
        assert_eq!(result.stdout.trim(), "rendering /tmp/scratch/Demo.py");
        assert_eq!(result.stderr.trim(), "warn");
        assert_eq!(result.exit_code, Some(0));
        assert!(result.error_message.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit() {
        let executor = shell_executor("echo 'NameError: boom' >&2; exit 3");
        let result = executor
            .run(&job(RenderJobConfig::default()), CancellationToken::new())
            .await;

        assert_eq!(result.outcome, RenderOutcome::ExitFailure);
        assert_eq!(result.exit_code, Some(3));
        assert_eq!(
            result.error_message.as_deref(),
            Some("Manim render failed with code 3")
        );
        assert!(result.stderr.contains("NameError: boom"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_process() {
        let executor = shell_executor("echo started; exec sleep 30");
        let start = Instant::now();
        let result = executor
            .run(
                &job(RenderJobConfig::default().with_timeout_secs(1)),
                CancellationToken::new(),
            )
            .await;

        assert_eq!(result.outcome, RenderOutcome::TimedOut);
        assert_eq!(
            result.error_message.as_deref(),
            Some("Render timed out after 1 seconds")
        );
        assert_eq!(result.stdout.trim(), "started");
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancellation() {
        let executor = shell_executor("exec sleep 30");
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let result = executor.run(&job(RenderJobConfig::default()), cancel).await;

        assert_eq!(result.outcome, RenderOutcome::Cancelled);
        assert_eq!(result.error_message.as_deref(), Some("Render cancelled by user"));
        assert_ne!(result.error_message, Some("Render timed out after 30 seconds".to_string()));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancellation_escalates_to_kill() {
        let executor = shell_executor("trap '' TERM; while :; do sleep 0.1; done");
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let result = executor.run(&job(RenderJobConfig::default()), cancel).await;

        assert_eq!(result.outcome, RenderOutcome::Cancelled);
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_after_finish_is_noop() {
        let executor = shell_executor("exit 0");
        let cancel = CancellationToken::new();
        let result = executor.run(&job(RenderJobConfig::default()), cancel.clone()).await;
        cancel.cancel();

        assert_eq!(result.outcome, RenderOutcome::Succeeded);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_background_child_is_killed_on_exit() {
        let executor = shell_executor("echo 'NameError: boom' >&2; sleep 20 & exit 1");
        let start = Instant::now();
        let result = executor
            .run(&job(RenderJobConfig::default()), CancellationToken::new())
            .await;

        assert_eq!(result.outcome, RenderOutcome::ExitFailure);
        assert_eq!(result.exit_code, Some(1));
        assert!(result.stderr.contains("NameError: boom"));
        // The leftover sleep held the pipes; killing it ends the drain early
        assert!(start.elapsed() < Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_drain_keeps_partial_output() {
        let (mut writer, reader) = tokio::io::duplex(64);
        tokio::io::AsyncWriteExt::write_all(&mut writer, b"partial traceback")
            .await
            .unwrap();

        let output = OutputReader::spawn(Some(reader));
        let text = output.drain(Duration::from_millis(200), "stderr").await;

        assert_eq!(text, "partial traceback");
        drop(writer);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported() {
        let config = RunnerConfig::new("/nonexistent/scenery-engine", vec![]).with_aux_tool_dir(None);
        let result = ProcessExecutor::new(config)
            .run(&job(RenderJobConfig::default()), CancellationToken::new())
            .await;

        assert_eq!(result.outcome, RenderOutcome::SpawnFailed);
        assert!(result
            .error_message
            .as_deref()
            .unwrap()
            .starts_with("Render exception:"));
        assert!(!result.stderr.is_empty());
    }
}
