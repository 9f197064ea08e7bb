//! Refresh policy keeping imported feed events in the event store consistent
//! across repeated syncs.
//!
//! Every reconciliation deletes *all* events tagged [`EventSource::Imported`]
//! and then inserts the freshly parsed ones. Deletion is scoped by origin tag,
//! not by feed URL, so a single-feed refresh also removes events that came
//! from other feeds. [`SyncPolicy::refresh`] therefore gathers every enabled
//! feed before reconciling once.

pub mod scheduler;

use crate::config::FeedSubscription;
use crate::event::{CalendarEvent, EventSource};
use crate::feed::{BlockOutcome, FeedFetcher, FeedParser, FetchError, SkipReason};
use crate::store::EventStore;
use anyhow::{anyhow, Result};
use log::{debug, error, info, warn};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

pub use scheduler::RefreshScheduler;

/// Minimum time between two refresh cycles.
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);
/// Period of the background refresh timer.
pub const DEFAULT_REFRESH_PERIOD: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub deleted: usize,
    pub inserted: usize,
}

/// A block the parser dropped, with the line of its `BEGIN:VEVENT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedBlock {
    pub line: usize,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedFeed {
    pub events: Vec<CalendarEvent>,
    pub skipped: Vec<SkippedBlock>,
}

impl ParsedFeed {
    fn from_outcomes(outcomes: Vec<BlockOutcome>) -> Self {
        let mut parsed = ParsedFeed::default();
        for outcome in outcomes {
            match outcome {
                BlockOutcome::Parsed(event) => parsed.events.push(event),
                BlockOutcome::Skipped { line, reason } => {
                    parsed.skipped.push(SkippedBlock { line, reason })
                }
            }
        }
        parsed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedStatus {
    Parsed { events: usize, skipped: usize },
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct FeedReport {
    pub url: String,
    pub name: String,
    pub status: FeedStatus,
}

#[derive(Debug, Clone, Default)]
pub struct RefreshReport {
    pub feeds: Vec<FeedReport>,
    pub summary: ReconcileSummary,
}

impl RefreshReport {
    pub fn failed(&self) -> impl Iterator<Item = &FeedReport> {
        self.feeds.iter().filter(|feed| matches!(feed.status, FeedStatus::Failed(_)))
    }
}

#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    /// Dropped because the previous refresh started less than the minimum
    /// interval ago.
    Throttled,
    Completed(RefreshReport),
}

/// Result of a manual single-feed import.
#[derive(Debug, Clone)]
pub struct ImportReport {
    pub url: String,
    pub summary: ReconcileSummary,
    pub skipped: Vec<SkippedBlock>,
}

impl ImportReport {
    /// Warning for the user when a feed fetched fine but held no events.
    pub fn empty_feed_warning(&self) -> Option<String> {
        (self.summary.inserted == 0)
            .then(|| format!("No events found in calendar feed {}", self.url))
    }
}

/// Owns the fetch, parse and reconcile cycle plus the refresh throttle.
/// Construct one per application session.
pub struct SyncPolicy<F, S> {
    fetcher: F,
    store: S,
    parser: FeedParser,
    min_interval: Duration,
    last_refresh: Mutex<Option<Instant>>,
}

impl<F: FeedFetcher, S: EventStore> SyncPolicy<F, S> {
    pub fn new(fetcher: F, store: S) -> Self {
        Self::with_min_interval(fetcher, store, DEFAULT_MIN_REFRESH_INTERVAL)
    }

    pub fn with_min_interval(fetcher: F, store: S, min_interval: Duration) -> Self {
        Self {
            fetcher,
            store,
            parser: FeedParser::new(),
            min_interval,
            last_refresh: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Records a refresh start unless one started within the minimum
    /// interval. Skipped attempts do not move the window.
    fn try_begin_refresh(&self) -> Result<bool> {
        let mut last = self.last_refresh.lock().map_err(|_| anyhow!("Throttle lock poisoned"))?;
        let now = Instant::now();
        if let Some(previous) = *last {
            let elapsed = now.duration_since(previous);
            if elapsed < self.min_interval {
                debug!(
                    "Skipping refresh, last one started {:?} ago (minimum {:?})",
                    elapsed, self.min_interval
                );
                return Ok(false);
            }
        }
        *last = Some(now);
        Ok(true)
    }

    pub async fn fetch_and_parse(&self, url: &str) -> Result<ParsedFeed, FetchError> {
        let text = self.fetcher.fetch(url).await?;
        let parsed = ParsedFeed::from_outcomes(self.parser.parse_blocks(&text));
        for skipped in &parsed.skipped {
            debug!("{}: dropped event at line {}: {}", url, skipped.line, skipped.reason);
        }
        Ok(parsed)
    }

    /// Replaces every imported event in the store with `events`. All deletes
    /// complete before the first insert.
    pub async fn reconcile(&self, events: Vec<CalendarEvent>) -> Result<ReconcileSummary> {
        let existing = self.store.query_by_source(EventSource::Imported).await?;
        let mut summary = ReconcileSummary::default();

        for event in &existing {
            match self.store.delete_by_id(&event.id).await {
                Ok(true) => summary.deleted += 1,
                Ok(false) => {}
                Err(e) => {
                    error!("Failed to delete imported event {}: {:#}", event.id, e);
                    return Err(e);
                }
            }
        }
        for event in events {
            let title = event.title.clone();
            if let Err(e) = self.store.insert(event).await {
                error!(
                    "Failed to store imported event '{}' after {} inserts: {:#}",
                    title, summary.inserted, e
                );
                return Err(e);
            }
            summary.inserted += 1;
        }

        info!(
            "Reconciled imported events: {} removed, {} inserted",
            summary.deleted, summary.inserted
        );
        Ok(summary)
    }

    /// Batch refresh over `feeds`, in order and one at a time. A feed that
    /// fails to fetch is logged and left out; the others still land. Events
    /// take the display color of the feed they came from.
    pub async fn refresh(&self, feeds: &[FeedSubscription]) -> Result<RefreshOutcome> {
        if !self.try_begin_refresh()? {
            return Ok(RefreshOutcome::Throttled);
        }

        let mut report = RefreshReport::default();
        let mut gathered = Vec::new();

        for feed in feeds {
            let status = match self.fetch_and_parse(&feed.url).await {
                Ok(parsed) => {
                    debug!("Parsed {} events from '{}'", parsed.events.len(), feed.name);
                    let status = FeedStatus::Parsed {
                        events: parsed.events.len(),
                        skipped: parsed.skipped.len(),
                    };
                    gathered.extend(parsed.events.into_iter().map(|mut event| {
                        event.color = feed.color.clone();
                        event
                    }));
                    status
                }
                Err(e) => {
                    warn!("Failed to refresh feed '{}' ({}): {}", feed.name, feed.url, e);
                    FeedStatus::Failed(e.to_string())
                }
            };
            report.feeds.push(FeedReport {
                url: feed.url.clone(),
                name: feed.name.clone(),
                status,
            });
        }

        report.summary = self.reconcile(gathered).await?;
        Ok(RefreshOutcome::Completed(report))
    }

    /// Throttled refresh of a single feed. Fetch errors are returned to the
    /// caller. Imported events from every other feed are removed as well.
    pub async fn refresh_feed(&self, url: &str) -> Result<RefreshOutcome> {
        if !self.try_begin_refresh()? {
            return Ok(RefreshOutcome::Throttled);
        }
        let parsed = self.fetch_and_parse(url).await?;
        let status =
            FeedStatus::Parsed { events: parsed.events.len(), skipped: parsed.skipped.len() };
        let summary = self.reconcile(parsed.events).await?;
        Ok(RefreshOutcome::Completed(RefreshReport {
            feeds: vec![FeedReport { url: url.to_string(), name: url.to_string(), status }],
            summary,
        }))
    }

    /// Manual import requested by the user. Not throttled; fetch errors are
    /// returned so they can be shown.
    pub async fn import_feed(&self, url: &str) -> Result<ImportReport> {
        let parsed = self.fetch_and_parse(url).await?;
        if parsed.events.is_empty() {
            warn!("Calendar feed {} contained no usable events", url);
        }
        let summary = self.reconcile(parsed.events).await?;
        Ok(ImportReport { url: url.to_string(), summary, skipped: parsed.skipped })
    }
}
