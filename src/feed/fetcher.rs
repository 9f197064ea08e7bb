//! Calendar feed retrieval over HTTP(S).

use async_trait::async_trait;
use log::{debug, info};
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::Client;
use std::sync::Arc;
use url::Url;

pub const CALENDAR_ACCEPT: &str = "text/calendar, text/plain, */*";
pub const DEFAULT_USER_AGENT: &str = concat!("famcal/", env!("CARGO_PKG_VERSION"));

const WEBCAL_PREFIX: &str = "webcal://";
const HTTPS_PREFIX: &str = "https://";

/// Failure to retrieve a feed. Never retried at this layer.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Failed to fetch calendar: {status} {status_text}")]
    Status { status: u16, status_text: String },
    #[error("Failed to fetch calendar: {0}")]
    Transport(#[from] reqwest::Error),
}

impl FetchError {
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            FetchError::Transport(e) => e.status().map(|s| s.as_u16()),
        }
    }
}

/// Rejected subscription URL.
#[derive(Debug, thiserror::Error)]
pub enum FeedUrlError {
    #[error("Invalid feed URL '{0}': {1}")]
    Invalid(String, url::ParseError),
    #[error("Unsupported feed URL scheme '{0}' (expected webcal, http or https)")]
    UnsupportedScheme(String),
}

/// Rewrites a `webcal://` prefix to `https://`; every other URL is returned
/// unchanged.
pub fn normalize_feed_url(url: &str) -> String {
    match url.get(..WEBCAL_PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(WEBCAL_PREFIX) => {
            format!("{}{}", HTTPS_PREFIX, &url[WEBCAL_PREFIX.len()..])
        }
        _ => url.to_string(),
    }
}

/// Checks that a subscription URL parses and uses webcal, http or https.
/// Callers run this before a URL reaches a [`FeedFetcher`].
pub fn validate_feed_url(url: &str) -> Result<Url, FeedUrlError> {
    let parsed =
        Url::parse(url.trim()).map_err(|e| FeedUrlError::Invalid(url.to_string(), e))?;
    match parsed.scheme() {
        "webcal" | "http" | "https" => Ok(parsed),
        other => Err(FeedUrlError::UnsupportedScheme(other.to_string())),
    }
}

/// Source of raw feed text.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

#[async_trait]
impl<T: FeedFetcher + ?Sized> FeedFetcher for Arc<T> {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        (**self).fetch(url).await
    }
}

/// reqwest-backed fetcher. No caching and no explicit timeout.
#[derive(Debug, Clone)]
pub struct HttpFeedFetcher {
    client: Client,
    user_agent: String,
}

impl HttpFeedFetcher {
    pub fn new() -> Self {
        Self::with_user_agent(DEFAULT_USER_AGENT)
    }

    pub fn with_user_agent(user_agent: &str) -> Self {
        Self { client: Client::new(), user_agent: user_agent.to_string() }
    }
}

impl Default for HttpFeedFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let request_url = normalize_feed_url(url);
        debug!("Fetching calendar feed from {}", request_url);

        let response = self
            .client
            .get(&request_url)
            .header(ACCEPT, CALENDAR_ACCEPT)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let body = response.text().await?;
        info!("Fetched {} bytes from {}", body.len(), request_url);
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_webcal() {
        assert_eq!(
            normalize_feed_url("webcal://example.com/cal.ics"),
            "https://example.com/cal.ics"
        );
        assert_eq!(
            normalize_feed_url("WEBCAL://example.com/cal.ics"),
            "https://example.com/cal.ics"
        );
    }

    #[test]
    fn test_normalize_leaves_other_schemes() {
        assert_eq!(normalize_feed_url("http://example.com/a.ics"), "http://example.com/a.ics");
        assert_eq!(normalize_feed_url("https://example.com/a.ics"), "https://example.com/a.ics");
        assert_eq!(normalize_feed_url("web"), "web");
    }

    #[test]
    fn test_validate_feed_url() {
        assert!(validate_feed_url("webcal://example.com/cal.ics").is_ok());
        assert!(validate_feed_url("https://example.com/cal.ics").is_ok());
        assert!(matches!(
            validate_feed_url("ftp://example.com/cal.ics"),
            Err(FeedUrlError::UnsupportedScheme(scheme)) if scheme == "ftp"
        ));
        assert!(matches!(validate_feed_url("not a url"), Err(FeedUrlError::Invalid(..))));
    }

    #[test]
    fn test_status_error_message() {
        let err = FetchError::Status { status: 404, status_text: "Not Found".to_string() };
        assert_eq!(err.to_string(), "Failed to fetch calendar: 404 Not Found");
        assert_eq!(err.status(), Some(404));
    }
}
