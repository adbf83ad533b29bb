//! Render command handler
//!
//! Runs one render job in a fresh session, reports the result and copies the
//! artifact out before the session's temporary directories are removed.

use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use scenery_core::domain::config::{Quality, RenderJobConfig};
use scenery_core::domain::result::{RenderOutcome, RenderResult};
use scenery_runner::service::export_artifact;
use scenery_runner::{RenderService, TracingEventSink};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::commands::read_input;
use crate::config::Config;

/// Arguments for `scenery render`
#[derive(Args)]
pub struct RenderArgs {
    /// Scene source file, or "-" for stdin
    pub file: String,

    /// Scene class to render (detected from the source when omitted)
    #[arg(short, long)]
    pub scene: Option<String>,

    /// Quality tier: low, medium, high, ultra or l/m/h/k
    #[arg(short, long)]
    pub quality: Option<String>,

    /// Output container (e.g., mp4, mov, gif)
    #[arg(short, long)]
    pub format: Option<String>,

    /// Timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Directory the engine writes its media tree to (kept after exit)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Let the engine reuse cached partial renders
    #[arg(long)]
    pub cache: bool,

    /// Directory the rendered file is copied to
    #[arg(short, long, default_value = ".")]
    pub export: PathBuf,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

/// JSON view of a finished render
#[derive(Serialize)]
struct RenderReport<'a> {
    #[serde(flatten)]
    result: &'a RenderResult,
    exported: Option<PathBuf>,
}

/// Handle the render command
///
/// Ctrl-C cancels the job; the engine is terminated before the command
/// returns.
///
/// # Arguments
/// * `args` - Render arguments
/// * `config` - The CLI configuration
pub async fn handle_render_command(args: RenderArgs, config: &Config) -> Result<()> {
    let code = read_input(&args.file)?;
    let runner = config.runner_config()?;
    debug!(
        "Engine: {} {}",
        runner.engine_program,
        runner.engine_args.join(" ")
    );

    let mut job = runner.default_job.clone();
    if let Some(quality) = &args.quality {
        job = job.with_quality(Quality::from_str_lossy(quality));
    }
    if let Some(format) = &args.format {
        job = job.with_format(format.as_str());
    }
    if let Some(timeout) = args.timeout {
        job = job.with_timeout_secs(timeout);
    }
    if let Some(dir) = &args.output_dir {
        job = job.with_output_dir(dir);
    }
    if args.cache {
        job = job.with_caching(true);
    }

    let service = RenderService::with_process_executor(runner, Arc::new(TracingEventSink))
        .context("Failed to create render session")?;

    let outcome = run(&service, &code, &args, job).await;
    service.cleanup().await;
    outcome
}

async fn run(
    service: &RenderService,
    code: &str,
    args: &RenderArgs,
    job: RenderJobConfig,
) -> Result<()> {
    let quality = job.quality;
    let handle = service
        .render(code, args.scene.as_deref(), Some(job))
        .await
        .context("Failed to start render")?;

    if !args.json {
        println!(
            "{} {} at {}",
            "Rendering".cyan().bold(),
            handle.scene_name().bold(),
            quality.dir_name()
        );
    }

    let wait = handle.wait();
    tokio::pin!(wait);

    let result = tokio::select! {
        result = &mut wait => result?,
        _ = tokio::signal::ctrl_c() => {
            service.cancel_current();
            wait.await?
        }
    };

    let exported = match &result.artifact {
        Some(artifact) => Some(
            export_artifact(artifact, &args.export)
                .with_context(|| format!("Failed to copy output to {}", args.export.display()))?,
        ),
        None => None,
    };

    if args.json {
        let report = RenderReport {
            result: &result,
            exported: exported.clone(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_result(&result, exported.as_ref());
    }

    if result.outcome.is_error() {
        anyhow::bail!(
            "{}",
            result.display_message().unwrap_or("Unknown render error")
        );
    }

    Ok(())
}

/// Print a human-readable result
fn print_result(result: &RenderResult, exported: Option<&PathBuf>) {
    let elapsed = format!("{:.1}s", result.duration.as_secs_f64()).dimmed();

    match result.outcome {
        RenderOutcome::Succeeded => {
            println!("{} in {}", "✓ Render complete".green().bold(), elapsed);
            if let Some(path) = exported {
                println!("  Saved to: {}", path.display().to_string().bold());
            }
        }
        RenderOutcome::Cancelled => {
            println!("{}", "Render cancelled".yellow());
        }
        _ => {
            println!("{} after {}", "✗ Render failed".red().bold(), elapsed);
            if let Some(message) = result.display_message() {
                println!("  {}", message.red());
            }
            if let Some(code) = result.exit_code {
                println!("  Exit code: {}", code.to_string().dimmed());
            }
        }
    }
}
