//! Scene inspection handlers

use anyhow::Result;
use colored::*;
use scenery_core::domain::config::Quality;
use scenery_runner::scene::detect_scene_name;

use crate::commands::read_input;
use crate::config::Config;

/// Print which scene a render of `file` would target
pub fn handle_detect_command(file: &str, config: &Config) -> Result<()> {
    let code = read_input(file)?;

    match detect_scene_name(&code) {
        Some(name) => println!("{}", name.bold()),
        None => {
            let runner = config.runner_config()?;
            println!(
                "{} {}",
                runner.default_scene_name.bold(),
                "(no scene class found, using default)".dimmed()
            );
        }
    }

    Ok(())
}

pub fn list_qualities() -> Result<()> {
    for quality in Quality::ALL {
        let preset = quality.preset();
        println!(
            "  {} {:<7} {}x{} @ {}fps  {}",
            quality.flag().to_string().cyan(),
            quality.name(),
            preset.width,
            preset.height,
            preset.frame_rate,
            quality.dir_name().dimmed()
        );
    }
    Ok(())
}
