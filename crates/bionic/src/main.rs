//! bionic - Bionic Memory CLI
//!
//! Talks to the memory store directly; no server required.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cli;
mod commands;
mod config;
mod error;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so --json output stays clean
    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::from_default_env()
                .add_directive(format!("bionic={}", level).parse()?)
                .add_directive(format!("bionic_sdk={}", level).parse()?),
        )
        .init();

    let config = config::Config::load()?;
    let json = cli.json;
    let user = cli.user.as_str();

    match cli.command {
        Commands::Turn { content, prompt } => {
            commands::memory::turn(&content, user, prompt, json, &config).await
        }
        Commands::Reply { content } => commands::memory::reply(&content, user, json, &config).await,
        Commands::Stats { all } => {
            commands::memory::stats((!all).then_some(user), json, &config).await
        }
        Commands::Clear { yes } => commands::memory::clear(user, yes, json, &config).await,
        Commands::Sweep(args) => commands::sweep::execute(args, user, json, &config).await,
        Commands::Decay(args) => commands::decay::execute(args, json),
        Commands::Profiles => commands::decay::profiles(json),
        Commands::Config(cmd) => commands::config::execute(cmd, json, &config),
    }
}
