//! Conversation memory commands.
//!
//! Opens the configured store directly; turns are ingested into long-term
//! memory, recalled and promoted into short-term memory exactly as the
//! server does it.

use anyhow::{Context, Result};
use bionic_sdk::{ClearStats, MemoryRecord, MemoryStats, SourceType};
use colored::Colorize;
use dialoguer::Confirm;
use serde::Serialize;

use super::{open_sdk, spinner};
use crate::config::Config;
use crate::error::CliError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecalledRecord<'a> {
    id: &'a str,
    source_type: SourceType,
    text: &'a str,
    heat: f64,
    cluster_size: usize,
}

impl<'a> From<&'a MemoryRecord> for RecalledRecord<'a> {
    fn from(record: &'a MemoryRecord) -> Self {
        Self {
            id: &record.id,
            source_type: record.metadata.source_type,
            text: record.display_text(),
            heat: record.metadata.valid_access_count,
            cluster_size: record.cluster_size,
        }
    }
}

/// Remember a user utterance and show the recall it produces.
pub async fn turn(content: &str, user: &str, show_prompt: bool, json: bool, config: &Config) -> Result<()> {
    let sdk = open_sdk(config).await?;

    let bar = spinner("Remembering and recalling...", json);
    let result = sdk.memory().process_user_turn(content, user).await;
    bar.finish_and_clear();
    let turn = result.context("Failed to process turn")?;

    if json {
        let records: Vec<RecalledRecord> = turn.records.iter().map(Into::into).collect();
        let out = serde_json::json!({ "records": records, "prompt": turn.prompt });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if show_prompt {
        println!("{}", turn.prompt);
        return Ok(());
    }

    println!(
        "{} Recalled {} {}:",
        "✓".green(),
        turn.records.len(),
        if turn.records.len() == 1 { "memory" } else { "memories" }
    );
    println!();
    for line in recall_lines(&turn.records) {
        println!("  {}", line);
    }
    Ok(())
}

/// Remember an agent reply.
pub async fn reply(content: &str, user: &str, json: bool, config: &Config) -> Result<()> {
    let sdk = open_sdk(config).await?;

    let bar = spinner("Storing reply...", json);
    let result = sdk.memory().store_agent_reply(content, user).await;
    bar.finish_and_clear();
    let promoted = result.context("Failed to store reply")?;

    if json {
        println!("{}", serde_json::json!({ "promoted": promoted }));
    } else {
        println!(
            "{} Stored reply for {} ({} promoted to short-term)",
            "✓".green(),
            user.cyan(),
            promoted
        );
    }
    Ok(())
}

/// Record counts per tier.
pub async fn stats(user: Option<&str>, json: bool, config: &Config) -> Result<()> {
    let sdk = open_sdk(config).await?;
    let stats = sdk
        .memory()
        .get_stats(user)
        .await
        .context("Failed to read memory stats")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print_stats(user, &stats);
    }
    Ok(())
}

/// Forget everything about a user.
pub async fn clear(user: &str, yes: bool, json: bool, config: &Config) -> Result<()> {
    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete every memory of user '{}'?", user))
            .default(false)
            .interact()
            .context("Failed to read confirmation")?;
        if !confirmed {
            return Err(CliError::Cancelled.into());
        }
    }

    let sdk = open_sdk(config).await?;
    let cleared = sdk
        .memory()
        .clear_user_history(user)
        .await
        .context("Failed to clear history")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&cleared)?);
    } else {
        print_cleared(user, &cleared);
    }
    Ok(())
}

/// One display line per recalled record, oldest first.
fn recall_lines(records: &[MemoryRecord]) -> Vec<String> {
    if records.is_empty() {
        return vec!["(nothing recalled yet)".dimmed().to_string()];
    }
    records
        .iter()
        .map(|r| {
            let cluster = if r.cluster_size > 1 {
                format!(" ×{}", r.cluster_size)
            } else {
                String::new()
            };
            format!(
                "{} {}{}",
                format!("{:>5}:", r.metadata.source_type.as_str()).cyan(),
                r.display_text(),
                cluster.dimmed()
            )
        })
        .collect()
}

fn print_stats(user: Option<&str>, stats: &MemoryStats) {
    let scope = user.map(|u| format!("user {}", u.cyan())).unwrap_or_else(|| "all users".into());
    println!("{} Memory records ({})", "●".cyan(), scope);
    println!("  Long-term:  {}", stats.long_term.total_records);
    println!("  Short-term: {}", stats.short_term.total_records);
}

fn print_cleared(user: &str, cleared: &ClearStats) {
    println!(
        "{} Cleared {} records for {}",
        "✓".green(),
        cleared.total_deleted,
        user.cyan()
    );
    println!("  Long-term:  {}", cleared.long_term_deleted);
    println!("  Short-term: {}", cleared.short_term_deleted);
}
