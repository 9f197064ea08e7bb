use super::{build_policy, ConfigLocation};
use crate::event::EventSource;
use crate::feed::{BlockOutcome, FeedParser};
use crate::store::EventStore;
use anyhow::{Context, Result};
use std::path::Path;

pub async fn list_events(location: &ConfigLocation, source: Option<EventSource>) -> Result<()> {
    let config = location.load()?;
    let policy = build_policy(&config)?;
    let store = policy.store();

    let mut events = match source {
        Some(source) => store.query_by_source(source).await?,
        None => store.list().await?,
    };
    events.sort_by(|a, b| a.start_date.cmp(&b.start_date));

    if events.is_empty() {
        println!("No events stored.");
        return Ok(());
    }
    for event in &events {
        println!("{}", event.display());
    }
    Ok(())
}

/// Offline parse of a feed file, listing every skipped block.
pub fn parse_file(file: &Path) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let outcomes = FeedParser::new().parse_blocks(&text);

    let mut parsed = 0;
    for outcome in &outcomes {
        match outcome {
            BlockOutcome::Parsed(event) => {
                parsed += 1;
                println!("{}", event.display());
            }
            BlockOutcome::Skipped { line, reason } => {
                println!("⚠️  line {}: skipped ({})", line, reason);
            }
        }
    }
    println!("\n{} events parsed, {} skipped", parsed, outcomes.len() - parsed);
    Ok(())
}
