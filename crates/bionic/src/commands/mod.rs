//! Command implementations for bionic CLI.
//!
//! Each submodule implements the logic for a command group.

pub mod config;
pub mod decay;
pub mod memory;
pub mod sweep;

use anyhow::{Context, Result};
use bionic_sdk::SDK;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::debug;

use crate::config::Config;

/// Open the memory system for a one-shot command.
///
/// Background cleanup jobs are never started from the CLI; `bionic sweep`
/// runs them on demand.
pub async fn open_sdk(config: &Config) -> Result<SDK> {
    let mut sdk_config = config.sdk.clone();
    sdk_config.scheduler.enabled = false;
    debug!(config = %config.path.display(), store = ?sdk_config.store.provider, "Opening memory store");

    let mut sdk = SDK::new(sdk_config).context("Failed to open memory store")?;
    sdk.initialize()
        .await
        .context("Failed to initialize memory collections")?;
    Ok(sdk)
}

/// Spinner on stderr while a slow call (embedding, summarizing) runs.
///
/// Hidden in JSON mode.
pub fn spinner(message: &str, json: bool) -> ProgressBar {
    if json {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        bar.set_style(style);
    }
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}
