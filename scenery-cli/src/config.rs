//! Configuration module
//!
//! Turns global CLI options into a runner configuration.

use anyhow::{Context, Result};
use scenery_runner::RunnerConfig;
use std::path::PathBuf;

/// CLI configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Engine command line, overriding the runner default
    pub engine: Option<String>,
    /// TeX toolchain directory; an empty value disables the PATH merge
    pub tex_dir: Option<PathBuf>,
    /// Base for temporary directories
    pub temp_dir: Option<PathBuf>,
}

impl Config {
    /// Builds the runner configuration
    ///
    /// Starts from the SCENERY_* environment and applies explicit options
    /// on top.
    pub fn runner_config(&self) -> Result<RunnerConfig> {
        let mut runner = RunnerConfig::from_env().context("Failed to read runner environment")?;

        if let Some(engine) = &self.engine {
            let mut parts = engine.split_whitespace().map(str::to_string);
            runner.engine_program = parts.next().context("--engine cannot be empty")?;
            runner.engine_args = parts.collect();
        }

        if let Some(dir) = &self.tex_dir {
            runner.aux_tool_dir = (!dir.as_os_str().is_empty()).then(|| dir.clone());
        }

        if let Some(dir) = &self.temp_dir {
            runner.temp_base = dir.clone();
        }

        runner.validate().context("Invalid runner configuration")?;
        Ok(runner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_override_is_split() {
        let config = Config {
            engine: Some("uv run manim".to_string()),
            tex_dir: Some(PathBuf::new()),
            temp_dir: Some(PathBuf::from("/var/tmp")),
        };

        let runner = config.runner_config().unwrap();
        assert_eq!(runner.engine_program, "uv");
        assert_eq!(runner.engine_args, vec!["run", "manim"]);
        assert!(runner.aux_tool_dir.is_none());
        assert_eq!(runner.temp_base, PathBuf::from("/var/tmp"));
    }

    #[test]
    fn test_blank_engine_is_rejected() {
        let config = Config {
            engine: Some("   ".to_string()),
            ..Config::default()
        };
        assert!(config.runner_config().is_err());
    }
}
