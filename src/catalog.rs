//! Show catalog bootstrap
//!
//! The feed site publishes an index page linking the search feed of every
//! show it knows. New entries are merged into the local show list as
//! unsubscribed shows so they can be configured later.

use crate::config::{FeedConfig, RetryConfig, ShowList};
use crate::retry::{IsRetryable, with_retry};
use crate::show::Show;
use regex::{Regex, RegexBuilder};
use std::collections::HashSet;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, warn};

static CATALOG_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r#"show_name=(.*?)&amp;show_name_exact=true">(.*?)<"#)
        .case_insensitive(true)
        .build()
        .expect("valid catalog regex")
});

/// Errors that can occur while fetching the catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The HTTP client could not be created
    #[error("Failed to create HTTP client: {0}")]
    ClientError(String),

    #[error("Failed to fetch catalog from {url}: {reason}")]
    RequestError { url: String, reason: String },

    #[error("HTTP {status} while fetching catalog from {url}")]
    HttpStatus { url: String, status: u16 },
}

impl IsRetryable for CatalogError {
    fn is_retryable(&self) -> bool {
        match self {
            CatalogError::ClientError(_) => false,
            CatalogError::RequestError { .. } => true,
            CatalogError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
        }
    }
}

/// A show listed on the catalog page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub exact_name: String,
    pub human_name: String,
}

/// Extracts all show entries from the catalog page
pub fn parse_catalog(html: &str) -> Vec<CatalogEntry> {
    CATALOG_ENTRY
        .captures_iter(html)
        .filter_map(|c| {
            let exact_name = match urlencoding::decode(&c[1].replace('+', " ")) {
                Ok(name) => name.into_owned(),
                Err(e) => {
                    warn!("Skipping catalog entry '{}': {}", &c[1], e);
                    return None;
                }
            };

            Some(CatalogEntry {
                exact_name,
                human_name: c[2].trim().to_string(),
            })
        })
        .collect()
}

/// Appends catalog entries not yet in `list` and returns how many were added
///
/// Existing shows keep their subscription, scheme and checkpoint.
pub fn merge_catalog(list: &mut ShowList, entries: Vec<CatalogEntry>, version: &str) -> usize {
    let mut known: HashSet<String> = list.shows.iter().map(|s| s.exact_name.clone()).collect();
    let before = list.shows.len();

    for entry in entries {
        if !known.insert(entry.exact_name.clone()) {
            continue;
        }

        list.shows.push(Show {
            exact_name: entry.exact_name,
            human_name: entry.human_name,
            subscribed: false,
            scheme: None,
            quality: None,
            checkpoint: None,
        });
    }

    list.version = version.to_string();
    list.shows.len() - before
}

/// Downloads and parses the catalog page
pub fn fetch_catalog(
    feed: &FeedConfig,
    retry: &RetryConfig,
) -> Result<Vec<CatalogEntry>, CatalogError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(feed.timeout())
        .user_agent(feed.user_agent.clone())
        .build()
        .map_err(|e| CatalogError::ClientError(e.to_string()))?;

    let url = feed.catalog_url.as_str();
    debug!("Fetching catalog {}", url);

    let html = with_retry(retry, "Catalog fetch", || {
        let response = client
            .get(url)
            .send()
            .map_err(|e| CatalogError::RequestError {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(CatalogError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        response.text().map_err(|e| CatalogError::RequestError {
            url: url.to_string(),
            reason: e.to_string(),
        })
    })?;

    let entries = parse_catalog(&html);
    debug!("Catalog lists {} show(s)", entries.len());
    Ok(entries)
}
