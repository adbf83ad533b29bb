//! Runner configuration
//!
//! Defines how the render engine is invoked and how its processes are
//! supervised: the engine command, auxiliary tool lookup, temporary storage
//! and termination timings.

use scenery_core::domain::config::{Quality, RenderJobConfig};
use std::path::PathBuf;
use std::time::Duration;

/// Runner configuration
///
/// Timings are configurable so tests can shorten them and slow machines can
/// stretch them.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Program that launches the engine (e.g., "python3")
    pub engine_program: String,

    /// Arguments placed before the `render` subcommand (e.g., ["-m", "manim"])
    pub engine_args: Vec<String>,

    /// Name used in user-facing failure messages
    pub engine_name: String,

    /// Directory merged into the child's PATH so the typesetting toolchain is
    /// found even when the parent was not started from a login shell
    pub aux_tool_dir: Option<PathBuf>,

    /// Where the session's scratch and media directories are created
    pub temp_base: PathBuf,

    /// Time a cancelled process gets between SIGTERM and SIGKILL
    pub cancel_grace: Duration,

    /// How long to keep reading stdout/stderr after the process is gone
    pub drain_timeout: Duration,

    /// Render target used when none is given and none is detected
    pub default_scene_name: String,

    /// Job settings used when a render call does not supply its own
    pub default_job: RenderJobConfig,
}

impl RunnerConfig {
    /// Creates a new configuration for the given engine command with defaults
    pub fn new(engine_program: impl Into<String>, engine_args: Vec<String>) -> Self {
        Self {
            engine_program: engine_program.into(),
            engine_args,
            engine_name: "Manim".to_string(),
            aux_tool_dir: Some(PathBuf::from("/Library/TeX/texbin")),
            temp_base: std::env::temp_dir(),
            cancel_grace: Duration::from_secs(2),
            drain_timeout: Duration::from_secs(2),
            default_scene_name: "GeneratedScene".to_string(),
            default_job: RenderJobConfig::default(),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// All variables are optional:
    /// - SCENERY_ENGINE (whitespace separated command, default: "python3 -m manim")
    /// - SCENERY_ENGINE_NAME (default: "Manim")
    /// - SCENERY_TEX_DIR (empty disables the PATH merge)
    /// - SCENERY_TEMP_DIR (default: system temp directory)
    /// - SCENERY_TIMEOUT (seconds, default: 30)
    /// - SCENERY_QUALITY (l/m/h/k or name, default: low)
    /// - SCENERY_CANCEL_GRACE_MS (default: 2000)
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(engine) = std::env::var("SCENERY_ENGINE") {
            let mut parts = engine.split_whitespace().map(str::to_string);
            config.engine_program = parts
                .next()
                .ok_or_else(|| anyhow::anyhow!("SCENERY_ENGINE is set but empty"))?;
            config.engine_args = parts.collect();
        }

        if let Ok(name) = std::env::var("SCENERY_ENGINE_NAME") {
            config.engine_name = name;
        }

        if let Ok(dir) = std::env::var("SCENERY_TEX_DIR") {
            config.aux_tool_dir = (!dir.is_empty()).then(|| PathBuf::from(dir));
        }

        if let Ok(dir) = std::env::var("SCENERY_TEMP_DIR") {
            config.temp_base = PathBuf::from(dir);
        }

        if let Some(timeout) = std::env::var("SCENERY_TIMEOUT")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            config.default_job.timeout_secs = timeout;
        }

        if let Ok(quality) = std::env::var("SCENERY_QUALITY") {
            config.default_job.quality = Quality::from_str_lossy(&quality);
        }

        if let Some(grace) = std::env::var("SCENERY_CANCEL_GRACE_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            config.cancel_grace = Duration::from_millis(grace);
        }

        Ok(config)
    }

    pub fn with_aux_tool_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.aux_tool_dir = dir;
        self
    }

    pub fn with_temp_base(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_base = dir.into();
        self
    }

    pub fn with_cancel_grace(mut self, grace: Duration) -> Self {
        self.cancel_grace = grace;
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.engine_program.trim().is_empty() {
            anyhow::bail!("engine_program cannot be empty");
        }

        if self.engine_name.trim().is_empty() {
            anyhow::bail!("engine_name cannot be empty");
        }

        if !crate::scene::is_valid_scene_name(&self.default_scene_name) {
            anyhow::bail!(
                "default_scene_name '{}' is not a valid identifier",
                self.default_scene_name
            );
        }

        self.default_job
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid default job config: {}", e))?;

        Ok(())
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::new("python3", vec!["-m".to_string(), "manim".to_string()])
    }
}
