//! CLI module - Command-line interface for Vidarr
//!
//! This module provides a structured CLI using clap for argument parsing.
//! Browse commands (home, search, info, links) talk to providers directly;
//! queue commands are sent to a running daemon over its HTTP API.

mod client;
mod commands;

use clap::{Parser, Subcommand};

/// Vidarr - Streaming content resolver and download manager
#[derive(Parser)]
#[command(name = "vidarr")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the download engine and HTTP API as a daemon
    #[command(alias = "-d", alias = "--daemon")]
    Daemon,

    /// Show the active provider's home page carousels
    Home,

    /// Search the active provider
    #[command(alias = "s")]
    Search {
        /// Search query
        #[arg(required = true)]
        query: Vec<String>,
        /// Result page to fetch
        #[arg(long, default_value = "1")]
        page: u32,
    },

    /// Show details for a single title
    #[command(alias = "i")]
    Info {
        /// Media type: movie, show or anime
        media_type: String,
        /// Provider content ID
        id: String,
    },

    /// Resolve playable streaming links for a title
    Links {
        /// Media type: movie, show or anime
        media_type: String,
        /// Provider content ID
        id: String,
        /// Season number (required for episodic content)
        #[arg(long)]
        season: Option<String>,
        /// Episode number (required for episodic content)
        #[arg(long)]
        episode: Option<String>,
    },

    /// Resolve links and queue the best one for download
    #[command(alias = "dl")]
    Download {
        /// Media type: movie, show or anime
        media_type: String,
        /// Provider content ID
        id: String,
        /// Season number (required for episodic content)
        #[arg(long)]
        season: Option<String>,
        /// Episode number (required for episodic content)
        #[arg(long)]
        episode: Option<String>,
        /// Queue priority: low, normal, high or urgent
        #[arg(long, default_value = "normal")]
        priority: String,
    },

    /// Show the daemon's queue grouped by state
    #[command(alias = "q")]
    Queue,

    /// List all download records
    #[command(alias = "ls", alias = "l")]
    List,

    /// Pause an active download
    Pause {
        /// Download ID
        id: String,
    },

    /// Requeue a paused or failed download
    Resume {
        /// Download ID
        id: String,
    },

    /// Cancel a download and remove partial data
    Cancel {
        /// Download ID
        id: String,
    },

    /// Delete a download record and its files
    #[command(alias = "rm")]
    Delete {
        /// Download ID
        id: String,
    },

    /// Convert a completed segmented download into a single file
    Convert {
        /// Download ID
        id: String,
    },

    /// Manage streaming providers
    Providers {
        #[command(subcommand)]
        command: Option<ProviderCommands>,
    },

    /// Create default config file
    #[command(alias = "--init")]
    Init,
}

#[derive(Subcommand)]
pub enum ProviderCommands {
    /// List registered providers
    #[command(alias = "ls")]
    List,
    /// Switch the active provider on the running daemon
    Use {
        /// Provider name as shown by `providers list`
        name: String,
    },
}

pub use client::DaemonClient;
pub use commands::*;
