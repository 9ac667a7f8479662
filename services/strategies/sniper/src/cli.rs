//! Command line surface

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Watch a contract and submit private bundles", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to config/chainwatch.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the watch pipeline until interrupted
    Watch {
        /// Log triggers without building bundles; no signing key needed
        #[arg(long)]
        observe_only: bool,
        /// Simulate every bundle instead of sending it
        #[arg(long)]
        simulate: bool,
    },
    /// Build and send one bundle now
    Fire,
    /// Build one bundle and simulate it against the relay
    Simulate,
    /// Dump the lock array configured under [storage]
    Locks {
        /// Override storage.max_entries
        #[arg(long)]
        max_entries: Option<u64>,
    },
    /// Print the current block number
    Head,
}

impl Command {
    /// Whether this mode signs transactions
    pub fn needs_keys(&self) -> bool {
        match self {
            Self::Watch { observe_only, .. } => !observe_only,
            Self::Fire | Self::Simulate => true,
            Self::Locks { .. } | Self::Head => false,
        }
    }
}
