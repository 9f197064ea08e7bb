use crate::cli::{Cli, Commands};
use crate::config::Config;
use crate::feed::HttpFeedFetcher;
use crate::store::JsonEventStore;
use crate::sync::SyncPolicy;
use anyhow::Result;
use log::debug;
use std::path::PathBuf;

pub mod events;
pub mod feed;
pub mod sync;

pub type AppPolicy = SyncPolicy<HttpFeedFetcher, JsonEventStore>;

/// Where the configuration lives for this invocation.
#[derive(Debug, Clone)]
pub struct ConfigLocation(Option<PathBuf>);

impl ConfigLocation {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self(path)
    }

    pub fn load(&self) -> Result<Config> {
        match &self.0 {
            Some(path) if path.exists() => Config::load_from(path),
            Some(path) => {
                debug!("{} does not exist yet, using defaults", path.display());
                Ok(Config::default())
            }
            None => Config::load(),
        }
    }

    pub fn save(&self, config: &Config) -> Result<()> {
        match &self.0 {
            Some(path) => config.save_to(path),
            None => config.save(),
        }
    }
}

/// Builds the session's sync policy from configuration.
pub fn build_policy(config: &Config) -> Result<AppPolicy> {
    let store = match &config.sync.store_path {
        Some(path) => JsonEventStore::new(path),
        None => JsonEventStore::open_default()?,
    };
    debug!("Using event store at {}", store.path().display());
    let fetcher = HttpFeedFetcher::with_user_agent(&config.sync.user_agent);
    Ok(SyncPolicy::with_min_interval(fetcher, store, config.sync.min_refresh_interval()))
}

pub async fn execute(cli: Cli) -> Result<()> {
    let location = ConfigLocation::new(cli.config);

    match cli.command {
        Commands::Feed { action } => feed::handle_feed_command(&location, action),
        Commands::Import { url } => sync::import(&location, &url).await,
        Commands::Refresh => sync::refresh(&location).await,
        Commands::Events { source } => events::list_events(&location, source).await,
        Commands::Parse { file } => events::parse_file(&file),
        Commands::Watch => sync::watch(location).await,
    }
}
