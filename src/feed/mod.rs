//! Feed retrieval
//!
//! This module provides the raw feed item type, the trait for feed sources,
//! and the RSS parsing shared by all HTTP-backed sources.
mod tvrss;

pub use tvrss::TvRssFeed;

use crate::retry::IsRetryable;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::warn;

/// Errors that can occur while fetching a feed
#[derive(Debug, Error)]
pub enum FeedError {
    /// The HTTP client could not be created
    #[error("Failed to create HTTP client: {0}")]
    ClientError(String),

    /// The request could not be sent or the response not read
    #[error("Request to {url} failed: {reason}")]
    RequestError { url: String, reason: String },

    /// The server answered with an error status
    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    /// The response is not a readable RSS document
    #[error("Unable to parse RSS feed: {0}")]
    ParseError(String),
}

impl IsRetryable for FeedError {
    fn is_retryable(&self) -> bool {
        match self {
            FeedError::RequestError { .. } => true,
            FeedError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            FeedError::ClientError(_) | FeedError::ParseError(_) => false,
        }
    }
}

/// A single raw item of a show's feed
#[derive(Debug, Clone, PartialEq)]
pub struct FeedItem {
    /// Release title, carries the quality tags
    pub title: String,
    /// Location of the release payload
    pub link: String,
    pub published: DateTime<Utc>,
    /// Free text holding the season, episode, date or title markers
    pub description: String,
}

/// Trait for sources of per-show release feeds
pub trait FeedSource {
    /// Fetches all items currently listed for the show with the given exact
    /// search name.
    fn fetch(&self, exact_name: &str) -> Result<Vec<FeedItem>, FeedError>;
}

/// Parses an RSS 2.0 document into feed items
///
/// Items without a link (or enclosure) or without a readable publication
/// date cannot be acted upon and are skipped with a warning.
pub fn parse_feed(content: &[u8]) -> Result<Vec<FeedItem>, FeedError> {
    let channel =
        rss::Channel::read_from(content).map_err(|e| FeedError::ParseError(e.to_string()))?;

    let items = channel
        .items()
        .iter()
        .filter_map(|item| {
            let title = item.title().unwrap_or_default().to_string();

            let Some(link) = item
                .link()
                .or_else(|| item.enclosure().map(|e| e.url()))
                .filter(|l| !l.trim().is_empty())
            else {
                warn!("Skipping feed item without link: {}", title);
                return None;
            };

            let published = match item.pub_date().map(DateTime::parse_from_rfc2822) {
                Some(Ok(date)) => date.with_timezone(&Utc),
                Some(Err(e)) => {
                    warn!("Skipping feed item with invalid date ({}): {}", e, title);
                    return None;
                }
                None => {
                    warn!("Skipping feed item without publication date: {}", title);
                    return None;
                }
            };

            Some(FeedItem {
                title,
                link: link.trim().to_string(),
                published,
                description: item.description().unwrap_or_default().to_string(),
            })
        })
        .collect();

    Ok(items)
}
