//! Command line definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// `SMSGuard` - keep unwanted senders out of your inbox.
#[derive(Parser, Debug)]
#[command(name = "smsguard")]
#[command(version)]
#[command(about = "Personal SMS blocklist with scheduled automatic unblocking", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Database file path (overrides the configuration file)
    #[arg(long, value_name = "PATH", global = true)]
    pub database: Option<PathBuf>,

    /// Verbose logging (-v, -vv)
    #[arg(short, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// User intents.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Block a number indefinitely
    Block {
        /// Number exactly as the carrier reports it
        identifier: String,
    },
    /// Unblock a number now, or schedule it to be unblocked later
    Unblock {
        /// Number exactly as the carrier reports it
        identifier: String,
        /// Keep blocking for this many days, then unblock automatically
        #[arg(long, value_name = "DAYS", allow_negative_numbers = true)]
        after_days: Option<i64>,
    },
    /// Show whether a number is blocked
    Status {
        /// Number to look up
        identifier: String,
    },
    /// List blocked numbers, newest first
    List,
    /// Run the delivery gate for one sender (exit code 1 means suppress)
    Check {
        /// Sender of the incoming message
        identifier: String,
    },
    /// Read one sender per line from stdin and print the gate verdict for each
    Receive,
    /// Remove blocks whose retention period has lapsed
    Sweep,
    /// Export blocked numbers to a JSON file
    Export {
        /// Output file (defaults to the configured export file name)
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
    },
    /// Import blocked numbers from a JSON file
    Import {
        /// Snapshot file to read
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
    /// Inspect or create the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration file actions.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write a default configuration file
    Init,
}

impl Cli {
    /// Log filter level implied by `-v` and `--quiet`.
    pub const fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}
