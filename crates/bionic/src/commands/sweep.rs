//! On-demand cleanup sweep.

use anyhow::{Context, Result};
use bionic_sdk::{CleanupReport, MemoryTier};
use colored::Colorize;

use super::{open_sdk, spinner};
use crate::cli::SweepArgs;
use crate::config::Config;

/// Forget cold records in one or both tiers.
pub async fn execute(args: SweepArgs, user: &str, json: bool, config: &Config) -> Result<()> {
    let sdk = open_sdk(config).await?;
    let scope = (!args.all_users).then_some(user);

    let bar = spinner("Sweeping...", json);
    let result = match args.tier {
        Some(tier) => sdk
            .memory()
            .cleanup_tier(MemoryTier::from(tier), scope)
            .await
            .map(|report| vec![report]),
        None => sdk.scheduler().run_cleanup_now(scope).await,
    };
    bar.finish_and_clear();
    let reports = result.context("Cleanup failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    for report in &reports {
        println!("{}", summary_line(report));
    }
    Ok(())
}

fn summary_line(report: &CleanupReport) -> String {
    let tier = report
        .tier
        .map(|t| t.as_str())
        .unwrap_or("unknown");
    let marker = if report.deleted() > 0 {
        "✓".green()
    } else {
        "●".dimmed()
    };
    format!(
        "{} {:<10} scanned {:>4}, forgot {:>4} (threshold {:.3})",
        marker,
        tier,
        report.scanned,
        report.deleted(),
        report.threshold
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_line() {
        colored::control::set_override(false);

        let report = CleanupReport {
            tier: Some(MemoryTier::ShortTerm),
            scanned: 12,
            deleted_ids: vec!["a".into(), "b".into()],
            threshold: 0.582,
        };
        assert_eq!(
            summary_line(&report),
            "✓ short_term scanned   12, forgot    2 (threshold 0.582)"
        );

        let idle = CleanupReport::default();
        assert_eq!(
            summary_line(&idle),
            "● unknown    scanned    0, forgot    0 (threshold 0.000)"
        );
    }
}
