//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// Incremental backup of a remote journal
#[derive(Parser, Debug)]
#[command(name = "jb", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding account backups (default: ~/.journal-backup/backups)
    #[arg(long, global = true, env = "JB_ROOT")]
    pub root: Option<PathBuf>,

    /// Journal account to back up
    #[arg(long, global = true, env = "JB_ACCOUNT")]
    pub account: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch new and changed entries and comments
    Backup(BackupArgs),

    /// Show what the local backup contains
    Status,

    /// Rebuild the tag and month indexes
    Reindex,

    /// Show the comment thread of one entry
    Comments {
        /// Entry id
        entry_id: u64,
    },

    /// Print version information
    Version,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug)]
pub struct BackupArgs {
    /// Base URL of the journal gateway
    #[arg(long, env = "JB_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Bearer token for the gateway
    #[arg(long, env = "JB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Skip rebuilding indexes after the backup
    #[arg(long)]
    pub no_reindex: bool,
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}
