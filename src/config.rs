use crate::event::IMPORTED_EVENT_COLOR;
use crate::feed::fetcher::{validate_feed_url, DEFAULT_USER_AGENT};
use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Subscribed feeds keyed by URL.
    #[serde(default)]
    pub feeds: BTreeMap<String, FeedConfig>,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    pub name: String,
    #[serde(default = "default_feed_color")]
    pub color: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_min_refresh_interval")]
    pub min_refresh_interval_secs: u64,
    #[serde(default = "default_refresh_period")]
    pub refresh_period_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Overrides the platform data directory for the event file.
    #[serde(default)]
    pub store_path: Option<PathBuf>,
}

/// A feed taking part in a refresh batch.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSubscription {
    pub url: String,
    pub name: String,
    pub color: String,
}

fn default_feed_color() -> String {
    IMPORTED_EVENT_COLOR.to_string()
}

fn default_enabled() -> bool {
    true
}

fn default_min_refresh_interval() -> u64 {
    30
}

fn default_refresh_period() -> u64 {
    600
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            min_refresh_interval_secs: default_min_refresh_interval(),
            refresh_period_secs: default_refresh_period(),
            user_agent: default_user_agent(),
            store_path: None,
        }
    }
}

impl SyncConfig {
    pub fn min_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.min_refresh_interval_secs)
    }

    pub fn refresh_period(&self) -> Result<Duration> {
        if self.refresh_period_secs == 0 {
            return Err(anyhow!("sync.refresh_period_secs must be greater than zero"));
        }
        Ok(Duration::from_secs(self.refresh_period_secs))
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = get_config_path()?;

        // If config doesn't exist, create default
        if !config_path.exists() {
            let default_config = Config::default();
            default_config.save()?;
            return Ok(default_config);
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Adds or replaces a feed subscription after checking its URL scheme.
    pub fn add_feed(&mut self, url: &str, name: Option<&str>, color: Option<&str>) -> Result<()> {
        let parsed = validate_feed_url(url)?;
        let name = name
            .map(str::to_string)
            .or_else(|| parsed.host_str().map(str::to_string))
            .unwrap_or_else(|| url.to_string());
        self.feeds.insert(
            url.trim().to_string(),
            FeedConfig {
                name,
                color: color.map(str::to_string).unwrap_or_else(default_feed_color),
                enabled: true,
            },
        );
        Ok(())
    }

    pub fn remove_feed(&mut self, url: &str) -> Result<FeedConfig> {
        self.feeds.remove(url).ok_or_else(|| anyhow!("No feed subscribed at '{}'", url))
    }

    pub fn set_feed_enabled(&mut self, url: &str, enabled: bool) -> Result<()> {
        let feed =
            self.feeds.get_mut(url).ok_or_else(|| anyhow!("No feed subscribed at '{}'", url))?;
        feed.enabled = enabled;
        Ok(())
    }

    /// Enabled feeds in URL order.
    pub fn enabled_feeds(&self) -> Vec<FeedSubscription> {
        self.feeds
            .iter()
            .filter(|(_, feed)| feed.enabled)
            .map(|(url, feed)| FeedSubscription {
                url: url.clone(),
                name: feed.name.clone(),
                color: feed.color.clone(),
            })
            .collect()
    }
}

fn get_config_path() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("com", "famcal", "famcal")
        .context("Failed to determine config directory")?;

    Ok(proj_dirs.config_dir().join("config.toml"))
}
