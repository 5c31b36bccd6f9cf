//! CLI module - Command-line interface for Agora
//!
//! Argument parsing is done with clap. Running without a subcommand starts
//! the web server.

mod commands;

use clap::{Parser, Subcommand};

pub use commands::*;

/// Agora - a small community forum with live chat
#[derive(Parser)]
#[command(name = "agora")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the web server and the maintenance scheduler
    #[command(alias = "web", alias = "-d", alias = "--daemon")]
    Serve,

    /// Create a default config file and prepare the database
    #[command(alias = "--init")]
    Init,

    /// Delete expired password reset tokens once
    Prune {
        /// Keep tokens that expired less than this many hours ago
        #[arg(long)]
        retention_hours: Option<u32>,
    },
}
