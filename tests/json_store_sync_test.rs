use anyhow::Result;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use famcal::{
    CalendarEvent, EventSource, EventStore, FeedFetcher, FetchError, JsonEventStore, SyncPolicy,
};
use std::time::Duration;
use tempfile::tempdir;

struct OneFeed(String);

#[async_trait]
impl FeedFetcher for OneFeed {
    async fn fetch(&self, _url: &str) -> Result<String, FetchError> {
        Ok(self.0.clone())
    }
}

#[tokio::test]
async fn test_import_into_json_store_survives_reopen() -> Result<()> {
    let temp_dir = tempdir()?;
    let path = temp_dir.path().join("events.json");

    let local = CalendarEvent::new_local(
        "Grandma visit",
        Utc.with_ymd_and_hms(2024, 6, 2, 14, 0, 0).unwrap(),
        None,
        false,
    );
    let store = JsonEventStore::new(&path);
    store.insert(local.clone()).await?;

    let feed = "BEGIN:VEVENT\nSUMMARY:Field trip\nDTSTART:20240603\nEND:VEVENT\n\
                BEGIN:VEVENT\nSUMMARY:Concert\nDTSTART:20240605T180000Z\nDTEND:20240605T193000Z\nEND:VEVENT";
    let policy =
        SyncPolicy::with_min_interval(OneFeed(feed.to_string()), store, Duration::ZERO);

    policy.import_feed("webcal://school.example.org/term.ics").await?;
    policy.import_feed("webcal://school.example.org/term.ics").await?;

    let reopened = JsonEventStore::new(&path);
    let all = reopened.list().await?;
    assert_eq!(all.len(), 3);
    assert_eq!(reopened.query_by_source(EventSource::Local).await?, vec![local]);

    let imported = reopened.query_by_source(EventSource::Imported).await?;
    let concert = imported.iter().find(|e| e.title == "Concert").expect("concert stored");
    assert_eq!(concert.end_date, Utc.with_ymd_and_hms(2024, 6, 5, 19, 30, 0).unwrap());
    assert!(imported.iter().any(|e| e.title == "Field trip" && e.all_day));
    Ok(())
}

#[tokio::test]
async fn test_import_into_full_store_keeps_it_readable() -> Result<()> {
    let temp_dir = tempdir()?;
    let path = temp_dir.path().join("events.json");

    let mut packing = CalendarEvent::new_local(
        "Packing list",
        Utc.with_ymd_and_hms(2024, 7, 1, 9, 0, 0).unwrap(),
        None,
        false,
    );
    packing.description = Some("x".repeat(10 * 1024 * 1024 - 1024));
    let store = JsonEventStore::new(&path);
    store.insert(packing).await?;

    let feed = "BEGIN:VEVENT\nSUMMARY:Camp day 1\nDTSTART:20240708\nEND:VEVENT\n\
                BEGIN:VEVENT\nSUMMARY:Camp day 2\nDTSTART:20240709\nEND:VEVENT\n\
                BEGIN:VEVENT\nSUMMARY:Camp day 3\nDTSTART:20240710\nEND:VEVENT";
    let policy =
        SyncPolicy::with_min_interval(OneFeed(feed.to_string()), store, Duration::ZERO);

    assert!(policy.import_feed("https://camp.example.org/summer.ics").await.is_err());
    assert!(std::fs::metadata(&path)?.len() <= 10 * 1024 * 1024);

    let local = policy.store().query_by_source(EventSource::Local).await?;
    assert_eq!(local.len(), 1);
    assert_eq!(local[0].title, "Packing list");

    // Leftover imports from the failed run can still be cleared.
    let summary = policy.reconcile(Vec::new()).await?;
    assert_eq!(summary.inserted, 0);
    assert!(policy.store().query_by_source(EventSource::Imported).await?.is_empty());
    Ok(())
}
