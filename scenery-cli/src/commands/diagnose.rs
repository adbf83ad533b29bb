//! Diagnose command handler
//!
//! Parses saved engine stderr the same way failed renders are parsed.

use anyhow::Result;
use clap::Args;
use colored::*;
use scenery_core::domain::diagnostic::ParsedError;
use scenery_runner::service::parse_stderr;

use crate::commands::read_input;

/// Arguments for `scenery diagnose`
#[derive(Args)]
pub struct DiagnoseArgs {
    /// File containing the engine's stderr, or "-" for stdin
    pub file: String,

    /// Path of the user's scene file, to prefer its frames
    #[arg(long)]
    pub hint: Option<String>,

    /// Print the parsed error as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn handle_diagnose_command(args: DiagnoseArgs) -> Result<()> {
    let stderr = read_input(&args.file)?;
    let parsed = parse_stderr(&stderr, args.hint.as_deref());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&parsed)?);
    } else {
        print_diagnostic(&parsed);
    }

    Ok(())
}

fn print_diagnostic(parsed: &ParsedError) {
    println!("{}", parsed.summary.red().bold());

    if !parsed.has_exception() {
        return;
    }

    println!();
    if let Some(error_type) = &parsed.error_type {
        println!("  Type:    {}", error_type.bold());
    }
    if let Some(line) = parsed.line_number {
        println!("  Line:    {}", line);
    }
    if let Some(message) = &parsed.message {
        println!("  Message: {}", message);
    }
}
