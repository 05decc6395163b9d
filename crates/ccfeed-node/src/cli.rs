use std::path::PathBuf;

use ccfeed_core::Checkpoint;
use clap::{Parser, Subcommand};

/// ccfeed - consensus change feed
#[derive(Parser)]
#[command(name = "ccfeed")]
#[command(about = "Consensus change feed node and utilities")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Follow the change feed, applying mutations read from stdin as JSON
    /// lines, until interrupted or the input ends
    Run {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,
    },

    /// Initialize a new node configuration
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },

    /// Show the head of the chain and the changelog
    Status {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,
    },

    /// Apply the mutations in a JSON-lines file
    Import {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,

        /// Mutation file, one JSON object per line
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Print consensus changes as JSON lines
    Changes {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,

        /// "beginning", "recent" or the hex id of the last processed change
        #[arg(long, default_value = "beginning")]
        from: Checkpoint,

        /// Stop after this many changes
        #[arg(short, long)]
        limit: Option<usize>,
    },
}
