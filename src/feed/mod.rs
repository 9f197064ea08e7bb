//! Calendar feed ingestion: fetching raw feed text and parsing it into events.

pub mod fetcher;
pub mod parser;

pub use fetcher::{
    normalize_feed_url, validate_feed_url, FeedFetcher, FeedUrlError, FetchError, HttpFeedFetcher,
};
pub use parser::{BlockOutcome, FeedParser, SkipReason};
