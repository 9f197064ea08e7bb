//! Background refresh driver: refreshes once on start, on a fixed period, and
//! whenever [`RefreshScheduler::trigger`] is called. Every run still goes
//! through the policy throttle.

use super::{RefreshOutcome, SyncPolicy};
use crate::config::FeedSubscription;
use crate::feed::FeedFetcher;
use crate::store::EventStore;
use anyhow::{ensure, Result};
use log::{debug, error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub struct RefreshScheduler {
    trigger: Arc<Notify>,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl RefreshScheduler {
    /// Starts the refresh task. `feeds` is called before each run so that
    /// subscription changes are picked up without a restart. `period` must be
    /// non-zero.
    pub fn spawn<F, S, L>(
        policy: Arc<SyncPolicy<F, S>>,
        feeds: L,
        period: Duration,
    ) -> Result<Self>
    where
        F: FeedFetcher + 'static,
        S: EventStore + 'static,
        L: Fn() -> Result<Vec<FeedSubscription>> + Send + Sync + 'static,
    {
        ensure!(!period.is_zero(), "Refresh period must be greater than zero");

        let trigger = Arc::new(Notify::new());
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let notified = Arc::clone(&trigger);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => debug!("Periodic refresh tick"),
                    _ = notified.notified() => debug!("Refresh triggered"),
                }
                run_once(&policy, &feeds).await;
            }
            info!("Refresh scheduler stopped");
        });

        Ok(Self { trigger, shutdown: shutdown_tx, handle })
    }

    /// Requests a refresh, e.g. after the visible date range changed.
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }

    /// Stops the task and waits for an in-flight refresh to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.handle.await {
            error!("Refresh scheduler task failed: {}", e);
        }
    }
}

async fn run_once<F, S, L>(policy: &SyncPolicy<F, S>, feeds: &L)
where
    F: FeedFetcher,
    S: EventStore,
    L: Fn() -> Result<Vec<FeedSubscription>>,
{
    let subscriptions = match feeds() {
        Ok(subscriptions) => subscriptions,
        Err(e) => {
            error!("Could not load feed subscriptions: {:#}", e);
            return;
        }
    };

    match policy.refresh(&subscriptions).await {
        Ok(RefreshOutcome::Throttled) => debug!("Refresh skipped by throttle"),
        Ok(RefreshOutcome::Completed(report)) => {
            let failed = report.failed().count();
            info!(
                "Refreshed {} feeds ({} failed): {} events imported",
                report.feeds.len(),
                failed,
                report.summary.inserted
            );
        }
        Err(e) => error!("Refresh failed: {:#}", e),
    }
}
