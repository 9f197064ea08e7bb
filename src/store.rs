use crate::event::{CalendarEvent, EventSource};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::fs;

const EVENTS_FILE: &str = "events.json";
// Maximum allowed size for the events file (10MB)
const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
const MAX_EVENTS: usize = 50_000;

/// Event storage used by the sync policy. Implementations own the events;
/// callers only insert, delete and query.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn insert(&self, event: CalendarEvent) -> Result<()>;

    /// Returns false when no event had that id.
    async fn delete_by_id(&self, id: &str) -> Result<bool>;

    async fn query_by_source(&self, source: EventSource) -> Result<Vec<CalendarEvent>>;

    async fn list(&self) -> Result<Vec<CalendarEvent>>;
}

#[async_trait]
impl<T: EventStore + ?Sized> EventStore for Arc<T> {
    async fn insert(&self, event: CalendarEvent) -> Result<()> {
        (**self).insert(event).await
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool> {
        (**self).delete_by_id(id).await
    }

    async fn query_by_source(&self, source: EventSource) -> Result<Vec<CalendarEvent>> {
        (**self).query_by_source(source).await
    }

    async fn list(&self) -> Result<Vec<CalendarEvent>> {
        (**self).list().await
    }
}

/// In-process store, used by tests and embedders that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    events: Mutex<Vec<CalendarEvent>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: Vec<CalendarEvent>) -> Self {
        Self { events: Mutex::new(events) }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<CalendarEvent>>> {
        self.events.lock().map_err(|_| anyhow!("Event store lock poisoned"))
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn insert(&self, event: CalendarEvent) -> Result<()> {
        self.lock()?.push(event);
        Ok(())
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool> {
        let mut events = self.lock()?;
        let before = events.len();
        events.retain(|event| event.id != id);
        Ok(events.len() != before)
    }

    async fn query_by_source(&self, source: EventSource) -> Result<Vec<CalendarEvent>> {
        Ok(self.lock()?.iter().filter(|event| event.source == source).cloned().collect())
    }

    async fn list(&self) -> Result<Vec<CalendarEvent>> {
        Ok(self.lock()?.clone())
    }
}

/// Store backed by a JSON array on disk. The file is read and rewritten on
/// every mutation; a mutation that would exceed the size or count limits is
/// rejected and the file is left as it was.
#[derive(Debug)]
pub struct JsonEventStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonEventStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: tokio::sync::Mutex::new(()) }
    }

    /// Store in the platform data directory.
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(default_store_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<CalendarEvent>> {
        if !fs::try_exists(&self.path).await? {
            return Ok(Vec::new());
        }

        let metadata = fs::metadata(&self.path).await?;
        if metadata.len() > MAX_FILE_SIZE {
            return Err(anyhow!("Event file {} exceeds size limit", self.path.display()));
        }

        let content = fs::read(&self.path)
            .await
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        let events: Vec<CalendarEvent> = serde_json::from_slice(&content)
            .map_err(|e| anyhow!("Failed to parse event file: {}", e))?;

        if events.len() > MAX_EVENTS {
            return Err(anyhow!("Too many events in file (maximum {})", MAX_EVENTS));
        }
        Ok(events)
    }

    async fn save(&self, events: &[CalendarEvent]) -> Result<()> {
        if events.len() > MAX_EVENTS {
            return Err(anyhow!("Too many events to store (maximum {})", MAX_EVENTS));
        }
        let content = serde_json::to_vec_pretty(events)?;
        if content.len() as u64 > MAX_FILE_SIZE {
            return Err(anyhow!(
                "Event file {} would exceed size limit ({} bytes)",
                self.path.display(),
                content.len()
            ));
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.path, content)
            .await
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }

    async fn modify<T>(&self, f: impl FnOnce(&mut Vec<CalendarEvent>) -> T) -> Result<T> {
        let _guard = self.write_lock.lock().await;
        let mut events = self.load().await?;
        let result = f(&mut events);
        self.save(&events).await?;
        Ok(result)
    }
}

#[async_trait]
impl EventStore for JsonEventStore {
    async fn insert(&self, event: CalendarEvent) -> Result<()> {
        self.modify(|events| events.push(event)).await
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool> {
        self.modify(|events| {
            let before = events.len();
            events.retain(|event| event.id != id);
            events.len() != before
        })
        .await
    }

    async fn query_by_source(&self, source: EventSource) -> Result<Vec<CalendarEvent>> {
        Ok(self.load().await?.into_iter().filter(|event| event.source == source).collect())
    }

    async fn list(&self) -> Result<Vec<CalendarEvent>> {
        self.load().await
    }
}

pub fn default_store_path() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("com", "famcal", "famcal")
        .context("Failed to determine data directory")?;
    Ok(proj_dirs.data_dir().join(EVENTS_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn event(title: &str, source: EventSource) -> CalendarEvent {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let mut event = CalendarEvent::new_local(title, start, None, false);
        event.source = source;
        event
    }

    #[tokio::test]
    async fn test_memory_store_query_and_delete() -> Result<()> {
        let store = MemoryEventStore::new();
        let imported = event("Match", EventSource::Imported);
        store.insert(imported.clone()).await?;
        store.insert(event("Piano", EventSource::Local)).await?;

        let found = store.query_by_source(EventSource::Imported).await?;
        assert_eq!(found, vec![imported.clone()]);

        assert!(store.delete_by_id(&imported.id).await?);
        assert!(!store.delete_by_id(&imported.id).await?);
        assert_eq!(store.list().await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_json_store_persists_between_instances() -> Result<()> {
        let temp_dir = tempdir()?;
        let path = temp_dir.path().join("nested").join("events.json");

        let store = JsonEventStore::new(&path);
        assert!(store.list().await?.is_empty());
        store.insert(event("Recital", EventSource::Imported)).await?;
        store.insert(event("Chores", EventSource::Local)).await?;

        let reopened = JsonEventStore::new(&path);
        let imported = reopened.query_by_source(EventSource::Imported).await?;
        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].title, "Recital");
        Ok(())
    }

    #[tokio::test]
    async fn test_json_store_rejects_garbage() -> Result<()> {
        let temp_dir = tempdir()?;
        let path = temp_dir.path().join("events.json");
        std::fs::write(&path, "not json")?;

        let store = JsonEventStore::new(&path);
        assert!(store.list().await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_json_store_refuses_insert_past_size_limit() -> Result<()> {
        let temp_dir = tempdir()?;
        let path = temp_dir.path().join("events.json");
        let store = JsonEventStore::new(&path);

        let mut bulky = event("Packing list", EventSource::Local);
        bulky.description = Some("x".repeat(MAX_FILE_SIZE as usize - 2048));
        store.insert(bulky).await?;
        let size_before = std::fs::metadata(&path)?.len();

        let mut imported = event("Swim meet", EventSource::Imported);
        imported.description = Some("y".repeat(4096));
        let err = store.insert(imported).await.unwrap_err();
        assert!(err.to_string().contains("exceed size limit"));

        assert_eq!(std::fs::metadata(&path)?.len(), size_before);
        let events = store.list().await?;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Packing list");
        Ok(())
    }
}
