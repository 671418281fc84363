//! Configuration commands.

use anyhow::{Context, Result};
use colored::Colorize;

use crate::cli::{ConfigAction, ConfigCommand};
use crate::config::Config;

pub fn execute(cmd: ConfigCommand, json: bool, config: &Config) -> Result<()> {
    match cmd.action {
        ConfigAction::Show => show(json, config),
        ConfigAction::Path => {
            if json {
                println!("{}", serde_json::json!({ "path": config.path, "exists": config.from_file }));
            } else {
                println!("{}", config.path.display());
            }
            Ok(())
        }
        ConfigAction::Init => {
            let written = Config::init(&config.path)?;
            if written {
                println!("{} Wrote default config to {}", "✓".green(), config.path.display());
            } else {
                println!("{} Config already exists at {}", "⚠".yellow(), config.path.display());
            }
            Ok(())
        }
    }
}

fn show(json: bool, config: &Config) -> Result<()> {
    let shown = config.redacted();
    if json {
        println!("{}", serde_json::to_string_pretty(&shown)?);
        return Ok(());
    }

    let source = if shown.from_file {
        shown.path.display().to_string()
    } else {
        format!("defaults ({} not found)", shown.path.display())
    };
    println!("{} {}", "# Source:".dimmed(), source.dimmed());
    println!(
        "{}",
        toml::to_string_pretty(&shown.sdk).context("Failed to serialize config")?
    );
    Ok(())
}
