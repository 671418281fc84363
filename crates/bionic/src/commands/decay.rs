//! Cooling curve inspection.

use anyhow::Result;
use bionic_sdk::{CoolingProfile, DecayModel};
use colored::Colorize;
use serde::Serialize;

use crate::cli::DecayArgs;
use crate::error::CliError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DecayReport {
    profile: CoolingProfile,
    alpha: f64,
    threshold: f64,
    initial: f64,
    elapsed_seconds: f64,
    value: f64,
    forgettable: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfileRow {
    name: &'static str,
    horizon_seconds: f64,
    final_ratio: f64,
    alpha: f64,
}

fn evaluate(args: &DecayArgs) -> Result<DecayReport, CliError> {
    let profile: CoolingProfile = args
        .profile
        .parse()
        .map_err(|_| CliError::UnknownProfile(args.profile.clone()))?;
    if !args.initial.is_finite() || args.initial < 0.0 {
        return Err(CliError::InvalidNumber("--initial"));
    }
    if !args.elapsed.is_finite() || args.elapsed < 0.0 {
        return Err(CliError::InvalidNumber("--elapsed"));
    }

    let model = DecayModel::new(profile);
    let value = model.decay(args.initial, args.elapsed);
    Ok(DecayReport {
        profile,
        alpha: model.alpha(),
        threshold: model.threshold(),
        initial: args.initial,
        elapsed_seconds: args.elapsed,
        value,
        forgettable: model.is_forgettable(value),
    })
}

/// Show what a heat of `initial` decays to after `elapsed` seconds.
pub fn execute(args: DecayArgs, json: bool) -> Result<()> {
    let report = evaluate(&args)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{} {:.4} → {:.4} after {} ({})",
        "●".cyan(),
        report.initial,
        report.value,
        format_duration(report.elapsed_seconds),
        report.profile.as_str()
    );
    println!("  alpha:     {:.3e} /s", report.alpha);
    println!("  threshold: {:.3}", report.threshold);
    if report.forgettable {
        println!("  {}", "would be forgotten by the next sweep".yellow());
    } else {
        println!("  {}", "still remembered".green());
    }
    Ok(())
}

/// List every cooling profile.
pub fn profiles(json: bool) -> Result<()> {
    let rows: Vec<ProfileRow> = CoolingProfile::ALL
        .iter()
        .map(|p| ProfileRow {
            name: p.as_str(),
            horizon_seconds: p.horizon_seconds(),
            final_ratio: p.final_ratio(),
            alpha: p.decay_constant(),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("{:<12} {:>8} {:>8} {:>12}", "PROFILE".bold(), "HORIZON", "RATIO", "ALPHA");
    for row in rows {
        println!(
            "{:<12} {:>8} {:>8.3} {:>12.3e}",
            row.name,
            format_duration(row.horizon_seconds),
            row.final_ratio,
            row.alpha
        );
    }
    Ok(())
}

/// Compact human duration: 45s, 20m, 6h, 31d.
fn format_duration(seconds: f64) -> String {
    const UNITS: [(f64, &str); 3] = [(86_400.0, "d"), (3_600.0, "h"), (60.0, "m")];
    for (size, suffix) in UNITS {
        if seconds >= size {
            let value = seconds / size;
            return if value.fract().abs() < 1e-9 {
                format!("{}{}", value as u64, suffix)
            } else {
                format!("{:.1}{}", value, suffix)
            };
        }
    }
    format!("{}s", seconds)
}
