use super::{build_policy, ConfigLocation};
use crate::feed::validate_feed_url;
use crate::sync::{FeedStatus, RefreshOutcome, RefreshReport, RefreshScheduler};
use anyhow::Result;
use log::info;
use std::sync::Arc;

/// Manual import of one feed. Transport failures are shown to the user.
pub async fn import(location: &ConfigLocation, url: &str) -> Result<()> {
    validate_feed_url(url)?;
    let config = location.load()?;
    let policy = build_policy(&config)?;

    println!("📥 Importing {}", url);
    let report = policy.import_feed(url).await?;

    if let Some(warning) = report.empty_feed_warning() {
        println!("⚠️  {}", warning);
    } else {
        println!(
            "✅ Imported {} events ({} previously imported events replaced)",
            report.summary.inserted, report.summary.deleted
        );
    }
    if !report.skipped.is_empty() {
        println!("   {} malformed entries were skipped", report.skipped.len());
    }
    Ok(())
}

pub async fn refresh(location: &ConfigLocation) -> Result<()> {
    let config = location.load()?;
    let feeds = config.enabled_feeds();
    if feeds.is_empty() {
        println!("No enabled feeds to refresh.");
        return Ok(());
    }

    let policy = build_policy(&config)?;
    match policy.refresh(&feeds).await? {
        RefreshOutcome::Throttled => println!("Refresh skipped, the last one was too recent."),
        RefreshOutcome::Completed(report) => print_report(&report),
    }
    Ok(())
}

/// Runs the background scheduler until Ctrl-C.
pub async fn watch(location: ConfigLocation) -> Result<()> {
    let config = location.load()?;
    let period = config.sync.refresh_period()?;
    let policy = Arc::new(build_policy(&config)?);

    info!("Watching enabled feeds every {:?}", period);
    println!("Refreshing enabled feeds every {} seconds. Press Ctrl-C to stop.", period.as_secs());

    let feeds_location = location.clone();
    let scheduler = RefreshScheduler::spawn(
        policy,
        move || feeds_location.load().map(|config| config.enabled_feeds()),
        period,
    )?;

    tokio::signal::ctrl_c().await?;
    println!("Stopping...");
    scheduler.shutdown().await;
    Ok(())
}

fn print_report(report: &RefreshReport) {
    for feed in &report.feeds {
        match &feed.status {
            FeedStatus::Parsed { events, skipped } if *skipped > 0 => {
                println!("  ✅ {}: {} events ({} skipped)", feed.name, events, skipped)
            }
            FeedStatus::Parsed { events, .. } => println!("  ✅ {}: {} events", feed.name, events),
            FeedStatus::Failed(reason) => println!("  ❌ {}: {}", feed.name, reason),
        }
    }
    println!(
        "Imported events: {} removed, {} inserted",
        report.summary.deleted, report.summary.inserted
    );
}
