//! Command-line interface.
//!
//! Flag values pass straight through into the agent prompt templates; the
//! binary itself has no subcommands.

use clap::Parser;

/// Generate a changelog PR from recent Slack product updates.
#[derive(Debug, Parser)]
#[command(name = "changelog-bot", version, about)]
pub struct Cli {
    /// Number of days back to fetch messages
    #[arg(long, default_value_t = 14)]
    pub days_back: i64,

    /// Include messages that already carry the processed emoji marker
    #[arg(long)]
    pub ignore_processed: bool,

    /// Remove :emoji: shortcodes from message text
    #[arg(long)]
    pub strip_emojis: bool,

    /// Open the pull request ready for review instead of as a draft
    #[arg(long)]
    pub no_draft: bool,
}
