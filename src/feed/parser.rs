//! Line-oriented calendar feed parser.
//!
//! Handles the subset of the interchange format the app consumes: single
//! `VEVENT` blocks with `SUMMARY`, `DTSTART`, `DTEND`, `DESCRIPTION` and
//! `LOCATION`. Every physical line is a complete logical line; folded
//! continuation lines and escapes other than `\,` `\;` `\\` are left as-is.
//!
//! Malformed blocks never fail a parse. [`FeedParser::parse`] drops them
//! silently, [`FeedParser::parse_blocks`] reports why each one was skipped.

use crate::event::{default_end, generate_event_id, CalendarEvent, EventSource};
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

const BEGIN_EVENT: &str = "BEGIN:VEVENT";
const END_EVENT: &str = "END:VEVENT";

static DATE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{8}(?:T\d{0,6})?Z?").expect("valid date token pattern"));
static ISO_DATE_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}").expect("valid ISO date-time pattern")
});

/// Why a block did not produce an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingSummary,
    MissingStart,
    /// `DTSTART` was captured but is not a real instant (e.g. month 13).
    InvalidStart(String),
    /// A new `BEGIN:VEVENT` arrived before this block's `END:VEVENT`.
    Superseded,
    /// Input ended inside the block.
    Unterminated,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingSummary => write!(f, "missing SUMMARY"),
            SkipReason::MissingStart => write!(f, "missing or unrecognised DTSTART"),
            SkipReason::InvalidStart(raw) => write!(f, "invalid DTSTART value '{}'", raw),
            SkipReason::Superseded => write!(f, "BEGIN:VEVENT without matching END:VEVENT"),
            SkipReason::Unterminated => write!(f, "unterminated event at end of input"),
        }
    }
}

/// Result for one `BEGIN:VEVENT` block, in the order blocks were closed.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockOutcome {
    Parsed(CalendarEvent),
    Skipped {
        /// 1-based line number of the block's `BEGIN:VEVENT`.
        line: usize,
        reason: SkipReason,
    },
}

impl BlockOutcome {
    pub fn event(&self) -> Option<&CalendarEvent> {
        match self {
            BlockOutcome::Parsed(event) => Some(event),
            BlockOutcome::Skipped { .. } => None,
        }
    }

    pub fn into_event(self) -> Option<CalendarEvent> {
        match self {
            BlockOutcome::Parsed(event) => Some(event),
            BlockOutcome::Skipped { .. } => None,
        }
    }
}

/// In-progress event between begin and end markers. Never outlives a parse.
#[derive(Debug, Default)]
struct FeedEvent {
    begin_line: usize,
    summary: Option<String>,
    start_raw: Option<String>,
    end_raw: Option<String>,
    description: Option<String>,
    location: Option<String>,
    all_day: bool,
}

impl FeedEvent {
    fn starting_at(begin_line: usize) -> Self {
        Self { begin_line, ..Default::default() }
    }

    /// Applies one property line. Prefixes are tested in a fixed order and the
    /// first match wins; anything else is ignored.
    fn apply_line(&mut self, line: &str) {
        if let Some(value) = line.strip_prefix("SUMMARY:") {
            self.summary = Some(unescape_text(value));
        } else if let Some(rest) = line.strip_prefix("DTSTART") {
            match extract_date_token(rest) {
                Some(token) => {
                    self.all_day = token.date_only;
                    self.start_raw = Some(token.value);
                }
                None => {
                    debug!("No date token in DTSTART line '{}'", line);
                    self.start_raw = None;
                }
            }
        } else if let Some(rest) = line.strip_prefix("DTEND") {
            self.end_raw = extract_date_token(rest).map(|token| token.value);
        } else if let Some(value) = line.strip_prefix("DESCRIPTION:") {
            self.description = Some(unescape_text(value));
        } else if let Some(value) = line.strip_prefix("LOCATION:") {
            self.location = Some(unescape_text(value));
        }
    }

    fn finalize(self) -> BlockOutcome {
        let line = self.begin_line;
        let title = match self.summary {
            Some(summary) if !summary.is_empty() => summary,
            _ => return BlockOutcome::Skipped { line, reason: SkipReason::MissingSummary },
        };
        let Some(start_raw) = self.start_raw else {
            return BlockOutcome::Skipped { line, reason: SkipReason::MissingStart };
        };
        let Some(start_date) = parse_timestamp(&start_raw) else {
            return BlockOutcome::Skipped { line, reason: SkipReason::InvalidStart(start_raw) };
        };
        let end_date = self
            .end_raw
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or_else(|| default_end(start_date));

        BlockOutcome::Parsed(CalendarEvent {
            id: generate_event_id(),
            title,
            start_date,
            end_date,
            all_day: self.all_day,
            description: self.description,
            location: self.location,
            color: EventSource::Imported.default_color().to_string(),
            source: EventSource::Imported,
        })
    }
}

/// Stateless parser for raw feed text.
#[derive(Debug, Default, Clone, Copy)]
pub struct FeedParser;

impl FeedParser {
    pub fn new() -> Self {
        Self
    }

    /// Events in the order their `END:VEVENT` markers appear. Malformed
    /// blocks are dropped.
    pub fn parse(&self, text: &str) -> Vec<CalendarEvent> {
        self.parse_blocks(text).into_iter().filter_map(BlockOutcome::into_event).collect()
    }

    /// One outcome per `BEGIN:VEVENT` block, including the skipped ones.
    pub fn parse_blocks(&self, text: &str) -> Vec<BlockOutcome> {
        let mut outcomes = Vec::new();
        let mut current: Option<FeedEvent> = None;

        for (index, raw_line) in text.split('\n').enumerate() {
            let line = raw_line.trim_end();
            let line_number = index + 1;

            if line == BEGIN_EVENT {
                if let Some(abandoned) = current.take() {
                    warn!(
                        "Event starting at line {} has no END:VEVENT, discarding it",
                        abandoned.begin_line
                    );
                    outcomes.push(BlockOutcome::Skipped {
                        line: abandoned.begin_line,
                        reason: SkipReason::Superseded,
                    });
                }
                current = Some(FeedEvent::starting_at(line_number));
                continue;
            }

            if line == END_EVENT {
                if let Some(finished) = current.take() {
                    let outcome = finished.finalize();
                    if let BlockOutcome::Skipped { line, reason } = &outcome {
                        debug!("Skipping event at line {}: {}", line, reason);
                    }
                    outcomes.push(outcome);
                }
            } else if let Some(event) = current.as_mut() {
                event.apply_line(line);
            }
        }

        if let Some(unterminated) = current {
            debug!("Input ended inside event starting at line {}", unterminated.begin_line);
            outcomes.push(BlockOutcome::Skipped {
                line: unterminated.begin_line,
                reason: SkipReason::Unterminated,
            });
        }

        outcomes
    }
}

#[derive(Debug, PartialEq)]
struct DateToken {
    value: String,
    date_only: bool,
}

/// Pulls the first date-like token out of the remainder of a `DTSTART` or
/// `DTEND` line and rewrites it as `YYYY-MM-DDTHH:MM:SSZ` or `YYYY-MM-DD`.
fn extract_date_token(rest: &str) -> Option<DateToken> {
    if let Some(found) = DATE_TOKEN.find(rest) {
        let token = found.as_str();
        let (date, tail) = token.split_at(8);
        let (year, month, day) = (&date[0..4], &date[4..6], &date[6..8]);
        match tail.strip_prefix('T') {
            Some(time) if time.len() >= 6 => {
                return Some(DateToken {
                    value: format!(
                        "{}-{}-{}T{}:{}:{}Z",
                        year,
                        month,
                        day,
                        &time[0..2],
                        &time[2..4],
                        &time[4..6]
                    ),
                    date_only: false,
                });
            }
            None if tail.is_empty() => {
                return Some(DateToken {
                    value: format!("{}-{}-{}", year, month, day),
                    date_only: true,
                });
            }
            _ => debug!("Unsupported date token '{}'", token),
        }
    }

    ISO_DATE_TIME
        .find(rest)
        .map(|found| DateToken { value: format!("{}Z", found.as_str()), date_only: false })
}

/// Converts a normalised date value into an instant. Date-only values are
/// midnight UTC.
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(date_time) = DateTime::parse_from_rfc3339(value) {
        return Some(date_time.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Undoes `\,` `\;` and `\\`. Other backslash sequences stay verbatim.
fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if matches!(next, ',' | ';' | '\\') {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}
