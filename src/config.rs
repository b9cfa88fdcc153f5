//! User preferences and the list of known shows
//!
//! Both documents are stored as JSON in the platform configuration directory.
//! Everything except the download folder has a default matching tvrss.net.

use crate::quality::{QualityTagGroup, QualityTier, default_tag_groups};
use crate::show::Show;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors in the configuration documents themselves
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to determine the configuration directory location
    #[error("Failed to determine configuration directory location")]
    ConfigDirectoryNotFound,

    /// Checking shows was switched off in the preferences
    #[error("TVShows is disabled")]
    Disabled,

    /// The download folder does not exist
    #[error("Non-existent download folder {0}")]
    MissingDownloadFolder(PathBuf),

    /// The feed URL template cannot be turned into a URL
    #[error("Invalid feed URL template '{template}': {reason}")]
    InvalidFeedTemplate { template: String, reason: String },
}

/// Default search feed, `{name}` is replaced by the encoded exact show name
pub const DEFAULT_FEED_TEMPLATE: &str =
    "http://tvrss.net/search/index.php?show_name={name}&show_name_exact=true&mode=rss";

/// Index page listing every show known to the feed site
pub const DEFAULT_CATALOG_URL: &str = "http://tvrss.net/shows";

/// Settings for the bounded retry of network operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of attempts (default: 3)
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    /// Pause between attempts in seconds (default: 5)
    #[serde(default = "default_pause_secs")]
    pub pause_secs: u64,
}

impl RetryConfig {
    pub fn pause(&self) -> Duration {
        Duration::from_secs(self.pause_secs)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            pause_secs: default_pause_secs(),
        }
    }
}

/// Where and how feeds are fetched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_feed_template")]
    pub url_template: String,

    #[serde(default = "default_catalog_url")]
    pub catalog_url: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl FeedConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url_template: default_feed_template(),
            catalog_url: default_catalog_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Global user preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    /// Whether checking for new episodes is switched on (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Folder downloaded torrent files are saved to, `~` is expanded
    pub torrent_folder: PathBuf,

    /// Open each torrent file with the default application after saving it
    #[serde(default)]
    pub open_after_download: bool,

    /// Highest quality tier to request, per-show settings override it
    #[serde(default)]
    pub quality: QualityTier,

    #[serde(default)]
    pub feed: FeedConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    /// Tag groups used to classify release titles
    #[serde(default = "default_tag_groups")]
    pub quality_tags: Vec<QualityTagGroup>,
}

impl Preferences {
    /// Creates preferences with defaults for everything but the folder
    pub fn new(torrent_folder: impl Into<PathBuf>) -> Self {
        Self {
            enabled: true,
            torrent_folder: torrent_folder.into(),
            open_after_download: false,
            quality: 0,
            feed: FeedConfig::default(),
            retry: RetryConfig::default(),
            quality_tags: default_tag_groups(),
        }
    }

    /// The download folder with a leading `~` expanded to the home directory
    pub fn resolved_torrent_folder(&self) -> PathBuf {
        expand_home(&self.torrent_folder)
    }

    /// Checks the preconditions for a run
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Err(ConfigError::Disabled);
        }

        if !self.feed.url_template.contains("{name}") {
            return Err(ConfigError::InvalidFeedTemplate {
                template: self.feed.url_template.clone(),
                reason: "missing {name} placeholder".to_string(),
            });
        }

        let folder = self.resolved_torrent_folder();
        if !folder.is_dir() {
            return Err(ConfigError::MissingDownloadFolder(folder));
        }

        Ok(())
    }
}

/// The list of shows known locally, subscribed or not
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShowList {
    /// Version of the application that last merged the catalog
    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub shows: Vec<Show>,
}

/// Default locations of the preferences and show list documents
///
/// - Linux: ~/.config/tvshows/
/// - macOS: ~/Library/Application Support/net.sourceforge.tvshows/
/// - Windows: %APPDATA%\tvshows\tvshows\config\
pub fn default_paths() -> Result<(PathBuf, PathBuf), ConfigError> {
    let proj_dirs = directories::ProjectDirs::from("net", "sourceforge", "tvshows")
        .ok_or(ConfigError::ConfigDirectoryNotFound)?;

    let config_dir = proj_dirs.config_dir();
    Ok((
        config_dir.join("preferences.json"),
        config_dir.join("shows.json"),
    ))
}

/// Expands a leading `~` to the current user's home directory
fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };

    match directories::BaseDirs::new() {
        Some(dirs) => dirs.home_dir().join(rest),
        None => path.to_path_buf(),
    }
}

fn default_true() -> bool {
    true
}

fn default_attempts() -> u32 {
    3
}

fn default_pause_secs() -> u64 {
    5
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_feed_template() -> String {
    DEFAULT_FEED_TEMPLATE.to_string()
}

fn default_catalog_url() -> String {
    DEFAULT_CATALOG_URL.to_string()
}

fn default_user_agent() -> String {
    format!("TVShows/{}", env!("CARGO_PKG_VERSION"))
}
