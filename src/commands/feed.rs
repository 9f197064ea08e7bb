use super::ConfigLocation;
use crate::cli::FeedActions;
use anyhow::Result;
use log::info;

pub fn handle_feed_command(location: &ConfigLocation, action: FeedActions) -> Result<()> {
    let mut config = location.load()?;

    match action {
        FeedActions::Add { url, name, color } => {
            config.add_feed(&url, name.as_deref(), color.as_deref())?;
            location.save(&config)?;
            info!("Subscribed to {}", url);
            println!("✅ Subscribed to {}", url);
        }
        FeedActions::Remove { url } => {
            let removed = config.remove_feed(&url)?;
            location.save(&config)?;
            println!("Removed feed '{}'", removed.name);
            println!("Previously imported events stay until the next refresh.");
        }
        FeedActions::Enable { url } => {
            config.set_feed_enabled(&url, true)?;
            location.save(&config)?;
            println!("Enabled {}", url);
        }
        FeedActions::Disable { url } => {
            config.set_feed_enabled(&url, false)?;
            location.save(&config)?;
            println!("Disabled {}", url);
        }
        FeedActions::List => {
            if config.feeds.is_empty() {
                println!("No feeds subscribed. Add one with: famcal feed add <url>");
                return Ok(());
            }
            println!("Subscribed feeds:");
            for (url, feed) in &config.feeds {
                let state = if feed.enabled { "enabled" } else { "disabled" };
                println!("  {} [{}] {} ({})", feed.name, feed.color, url, state);
            }
        }
    }

    Ok(())
}
