//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod detect;
mod diagnose;
mod render;

pub use diagnose::DiagnoseArgs;
pub use render::RenderArgs;

use anyhow::{Context, Result};
use clap::Subcommand;
use std::io::Read;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Render a scene file
    Render(RenderArgs),
    /// Explain a failed render's stderr
    Diagnose(DiagnoseArgs),
    /// Print the scene a file would render
    Detect {
        /// Scene source file, or "-" for stdin
        file: String,
    },
    /// List quality tiers
    Qualities,
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Arguments
/// * `command` - The command to execute
/// * `config` - The CLI configuration
///
/// # Returns
/// Result indicating success or failure
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Render(args) => render::handle_render_command(args, config).await,
        Commands::Diagnose(args) => diagnose::handle_diagnose_command(args),
        Commands::Detect { file } => detect::handle_detect_command(&file, config),
        Commands::Qualities => detect::list_qualities(),
    }
}

/// Reads a file, or stdin when `path` is "-"
pub(crate) fn read_input(path: &str) -> Result<String> {
    if path == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read stdin")?;
        return Ok(buffer);
    }

    std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))
}
