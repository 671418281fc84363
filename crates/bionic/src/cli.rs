//! CLI argument definitions using clap derive macros.

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Bionic Memory CLI
///
/// Dual-tier decaying memory: remember turns, inspect recall, sweep cold records.
#[derive(Parser, Debug)]
#[command(name = "bionic")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// User whose memories are read and written
    #[arg(short, long, global = true, env = "BIONIC_USER_ID", default_value = "local")]
    pub user: String,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Remember a user utterance and show what it recalls
    Turn {
        /// What the user said
        content: String,

        /// Print the full reply prompt instead of the recalled lines
        #[arg(short, long)]
        prompt: bool,
    },

    /// Remember an agent reply (ingest and promote into short-term memory)
    Reply {
        /// What the agent said
        content: String,
    },

    /// Show record counts per tier
    Stats {
        /// Count every user's records
        #[arg(short, long)]
        all: bool,
    },

    /// Forget everything about the current user
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Delete records whose heat has decayed below their tier's threshold
    Sweep(SweepArgs),

    /// Evaluate the cooling curve for a profile
    Decay(DecayArgs),

    /// List the cooling profiles and their thresholds
    Profiles,

    /// Configuration management
    Config(ConfigCommand),
}

#[derive(Args, Debug)]
pub struct SweepArgs {
    /// Only sweep one tier (default: both, short-term first)
    #[arg(short, long, value_enum)]
    pub tier: Option<TierArg>,

    /// Sweep every user's records, not just the current user's
    #[arg(short, long)]
    pub all_users: bool,
}

#[derive(Args, Debug)]
pub struct DecayArgs {
    /// Cooling profile name, e.g. minutes_20 or days_31
    #[arg(short, long, default_value = "days_31")]
    pub profile: String,

    /// Heat at the last update
    #[arg(short, long, default_value_t = 1.0)]
    pub initial: f64,

    /// Seconds since the last update
    #[arg(short, long)]
    pub elapsed: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum TierArg {
    Short,
    Long,
}

impl From<TierArg> for bionic_sdk::MemoryTier {
    fn from(tier: TierArg) -> Self {
        match tier {
            TierArg::Short => bionic_sdk::MemoryTier::ShortTerm,
            TierArg::Long => bionic_sdk::MemoryTier::LongTerm,
        }
    }
}

#[derive(Args, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration (API keys redacted)
    Show,

    /// Print the config file location
    Path,

    /// Write a default config file if none exists
    Init,
}
