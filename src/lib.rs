pub mod cli;
pub mod commands;
pub mod config;
pub mod event;
pub mod feed;
pub mod store;
pub mod sync;

use anyhow::Result;
use log::*;

pub async fn run(cli: cli::Cli) -> Result<()> {
    debug!("Running command: {:?}", cli.command);
    commands::execute(cli).await
}

// Re-export commonly used types
pub use config::{Config, FeedSubscription};
pub use event::{CalendarEvent, EventSource};
pub use feed::{FeedFetcher, FeedParser, FetchError, HttpFeedFetcher};
pub use store::{EventStore, JsonEventStore, MemoryEventStore};
pub use sync::{RefreshOutcome, SyncPolicy};
