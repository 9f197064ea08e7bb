use crate::event::EventSource;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// famcal - family calendar feed subscriptions
#[derive(Debug, Parser)]
#[command(name = "famcal")]
#[command(about = "Subscribe to calendar feeds and keep imported events in sync", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Use this config file instead of the platform default
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Manage feed subscriptions
    #[command(alias = "feeds")]
    Feed {
        #[command(subcommand)]
        action: FeedActions,
    },

    /// Import a single feed now, replacing previously imported events
    Import {
        /// Feed URL (webcal://, http:// or https://)
        #[arg(required = true)]
        url: String,
    },

    /// Refresh all enabled feeds
    #[command(alias = "sync")]
    Refresh,

    /// List stored events
    Events {
        /// Only show events with this origin (local, imported, other-imported)
        #[arg(long)]
        source: Option<EventSource>,
    },

    /// Parse a local feed file and report skipped entries
    Parse {
        #[arg(required = true)]
        file: PathBuf,
    },

    /// Keep refreshing enabled feeds in the foreground until Ctrl-C
    Watch,
}

#[derive(Debug, Subcommand)]
pub enum FeedActions {
    /// Subscribe to a feed
    Add {
        #[arg(required = true)]
        url: String,

        /// Display name (defaults to the feed host)
        #[arg(long)]
        name: Option<String>,

        /// Display color, e.g. "#FF8800"
        #[arg(long)]
        color: Option<String>,
    },

    /// Unsubscribe from a feed
    #[command(alias = "rm")]
    Remove {
        #[arg(required = true)]
        url: String,
    },

    /// Include a feed in refreshes
    Enable {
        #[arg(required = true)]
        url: String,
    },

    /// Exclude a feed from refreshes without removing it
    Disable {
        #[arg(required = true)]
        url: String,
    },

    /// List subscribed feeds
    #[command(alias = "ls")]
    List,
}
