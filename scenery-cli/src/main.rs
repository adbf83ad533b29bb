//! Scenery CLI
//!
//! Command-line front end for the Scenery render pipeline.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "scenery")]
#[command(about = "Render animation scenes with an external engine", long_about = None)]
struct Cli {
    /// Engine command, program first (e.g. "python3 -m manim")
    #[arg(long, global = true, env = "SCENERY_ENGINE")]
    engine: Option<String>,

    /// Directory with the TeX toolchain, merged into the engine's PATH
    #[arg(long, global = true, env = "SCENERY_TEX_DIR")]
    tex_dir: Option<PathBuf>,

    /// Base directory for the session's scratch and media directories
    #[arg(long, global = true, env = "SCENERY_TEMP_DIR")]
    temp_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so --json output stays parseable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scenery_cli=info,scenery_runner=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = Config {
        engine: cli.engine,
        tex_dir: cli.tex_dir,
        temp_dir: cli.temp_dir,
    };

    handle_command(cli.command, &config).await
}
