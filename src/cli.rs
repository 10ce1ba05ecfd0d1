use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "claude-stats")]
#[command(about = "Track Claude usage limits, session history and Claude Code updates")]
#[command(version)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Config file (defaults to config.yaml in the data directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level unless CLAUDE_STATS_LOG is set
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Poll usage, service status and updates until interrupted
    Watch,
    /// Fetch current usage once and record it
    Fetch {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the recorded usage snapshots
    History {
        #[arg(long)]
        json: bool,
    },
    /// Print session windows reconstructed from the history
    Sessions {
        #[arg(long)]
        json: bool,
    },
    /// Compare the installed Claude Code version with the latest release
    Version,
    /// Hide the update notice until a newer release appears
    DismissUpdate,
    /// Show the Claude service status
    Status,
    /// Summarize the local Claude Code activity cache
    LocalStats {
        #[arg(long)]
        json: bool,
    },
    /// Store the claude.ai session key
    Login {
        /// Value of the `sessionKey` cookie
        #[arg(long)]
        session_key: String,

        /// Full cookie header copied from the browser, for the Cloudflare clearance cookie
        #[arg(long)]
        cookies: Option<String>,
    },
    /// Remove stored credentials and the cached organization
    Logout,
}
