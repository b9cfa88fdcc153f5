/// tvrss.net feed source implementation.
use super::{FeedError, FeedItem, FeedSource, parse_feed};
use crate::config::{FeedConfig, RetryConfig};
use crate::retry::with_retry;
use tracing::debug;

/// Feed source for tvrss.net style search feeds.
///
/// The search URL is built from a template with a `{name}` placeholder that
/// is replaced by the URL-encoded exact show name.
pub struct TvRssFeed {
    client: reqwest::blocking::Client,
    url_template: String,
    retry: RetryConfig,
}

impl TvRssFeed {
    /// Creates a new feed source from the feed and retry settings.
    pub fn new(feed: &FeedConfig, retry: &RetryConfig) -> Result<Self, FeedError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(feed.timeout())
            .user_agent(feed.user_agent.clone())
            .build()
            .map_err(|e| FeedError::ClientError(e.to_string()))?;

        Ok(Self {
            client,
            url_template: feed.url_template.clone(),
            retry: retry.clone(),
        })
    }

    /// Builds the search URL for a show.
    fn feed_url(&self, exact_name: &str) -> String {
        self.url_template
            .replace("{name}", &urlencoding::encode(exact_name))
    }

    /// Downloads the raw feed document once.
    fn download(&self, url: &str) -> Result<Vec<u8>, FeedError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| FeedError::RequestError {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(FeedError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response.bytes().map_err(|e| FeedError::RequestError {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(body.to_vec())
    }
}

impl FeedSource for TvRssFeed {
    fn fetch(&self, exact_name: &str) -> Result<Vec<FeedItem>, FeedError> {
        let url = self.feed_url(exact_name);
        debug!("Fetching feed {}", url);

        let content = with_retry(&self.retry, "Feed fetch", || self.download(&url))?;
        let items = parse_feed(&content)?;

        debug!("Feed for '{}' lists {} item(s)", exact_name, items.len());
        Ok(items)
    }
}
