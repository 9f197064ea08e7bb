//! Canonical calendar event record shared by the parser, the sync policy and
//! the event stores.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Display color given to events created on this device.
pub const LOCAL_EVENT_COLOR: &str = "#4A90E2";
/// Display color given to events imported from a calendar feed.
pub const IMPORTED_EVENT_COLOR: &str = "#9B59B6";

/// Origin tag of a calendar event.
///
/// Only [`EventSource::Imported`] events are ever removed by a feed refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventSource {
    Local,
    Imported,
    OtherImported,
}

impl EventSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSource::Local => "local",
            EventSource::Imported => "imported",
            EventSource::OtherImported => "other-imported",
        }
    }

    pub fn default_color(&self) -> &'static str {
        match self {
            EventSource::Local => LOCAL_EVENT_COLOR,
            EventSource::Imported | EventSource::OtherImported => IMPORTED_EVENT_COLOR,
        }
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(EventSource::Local),
            "imported" => Ok(EventSource::Imported),
            "other-imported" | "other_imported" => Ok(EventSource::OtherImported),
            other => Err(format!("Unknown event source: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub all_day: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub color: String,
    pub source: EventSource,
}

impl CalendarEvent {
    /// Create an event created on this device. A missing end defaults to one
    /// hour after the start.
    pub fn new_local(
        title: &str,
        start_date: DateTime<Utc>,
        end_date: Option<DateTime<Utc>>,
        all_day: bool,
    ) -> Self {
        Self {
            id: generate_event_id(),
            title: title.to_string(),
            start_date,
            end_date: end_date.unwrap_or_else(|| default_end(start_date)),
            all_day,
            description: None,
            location: None,
            color: EventSource::Local.default_color().to_string(),
            source: EventSource::Local,
        }
    }

    pub fn is_imported(&self) -> bool {
        self.source == EventSource::Imported
    }

    /// One-line summary for terminal output.
    pub fn display(&self) -> String {
        let when = if self.all_day {
            format!("{} (all day)", self.start_date.format("%Y-%m-%d"))
        } else {
            format!(
                "{} - {}",
                self.start_date.format("%Y-%m-%d %H:%M"),
                self.end_date.format("%H:%M")
            )
        };
        let mut output = format!("{}  {}  [{}]", when, self.title, self.source);
        if let Some(location) = &self.location {
            output.push_str(&format!("\n   Location: {}", location));
        }
        output
    }
}

/// End used when a source gives no usable end timestamp.
pub fn default_end(start: DateTime<Utc>) -> DateTime<Utc> {
    start + Duration::hours(1)
}

/// Fresh event id: base-36 millisecond timestamp followed by random hex.
/// Ids are assigned once and never recomputed.
pub fn generate_event_id() -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    let random = Uuid::new_v4().simple().to_string();
    format!("{}{}", to_base36(millis), &random[..9])
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
