//! TVShows - Automatically download new episodes of subscribed TV shows
//!
//! This library checks a torrent search feed for every subscribed show, picks
//! the newest episodes in the best quality worth waiting for, downloads their
//! torrent files, and remembers how far each show has been followed.

mod catalog;
mod config;
mod connectivity;
mod dispatch;
mod episode;
mod feed;
mod file_naming;
mod parser;
mod quality;
mod retry;
mod runner;
mod selector;
mod show;
mod store;
mod temp;

use chrono::{DateTime, Utc};

// Re-export error types
pub use catalog::CatalogError;
pub use config::ConfigError;
pub use connectivity::ConnectivityError;
pub use dispatch::DownloadError;
pub use feed::FeedError;
pub use quality::QualityError;
pub use runner::ShowError;
pub use show::ShowConfigError;
pub use store::StoreError;

// Re-export domain types
pub use catalog::{CatalogEntry, fetch_catalog, merge_catalog, parse_catalog};
pub use config::{
    DEFAULT_CATALOG_URL, DEFAULT_FEED_TEMPLATE, FeedConfig, Preferences, RetryConfig, ShowList,
    default_paths,
};
pub use connectivity::check_connectivity;
pub use dispatch::{EpisodeDispatcher, TorrentDownloader};
pub use episode::{Episode, EpisodeKey, EpisodeKind};
pub use feed::{FeedItem, FeedSource, TvRssFeed, parse_feed};
pub use file_naming::sanitize_filename;
pub use parser::EpisodeParser;
pub use quality::{QualityClassifier, QualityTagGroup, QualityTier, default_tag_groups};
pub use retry::IsRetryable;
pub use runner::{DownloadedEpisode, FailedEpisode, ShowOutcome, ShowReport, ShowRunner};
pub use selector::{
    Candidate, EpisodeSelector, Selection, SelectionPlan, SelectionReason, QUALITY_WINDOW,
};
pub use show::{OrganizationScheme, Show};
pub use store::JsonFile;

use thiserror::Error;

/// Progress event emitted during a run
///
/// These events allow library users to follow the run show by show and
/// provide feedback without parsing log output.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Run started
    Started { show_count: usize },

    /// Checking the feed of a subscribed show
    CheckingShow {
        index: usize,
        total: usize,
        show_name: String,
    },

    /// An unsubscribed show was passed over
    ShowSkipped { show_name: String },

    /// A torrent file was saved
    EpisodeDownloaded {
        show_name: String,
        key: EpisodeKey,
        path: std::path::PathBuf,
    },

    /// A chosen episode could not be downloaded, it is retried next run
    DownloadFailed {
        show_name: String,
        key: EpisodeKey,
        reason: String,
    },

    /// The show was checked
    ShowChecked {
        show_name: String,
        checkpoint: EpisodeKey,
        pending: usize,
    },

    /// The show could not be checked, its checkpoint is unchanged
    ShowFailed { show_name: String, reason: String },

    /// Run complete
    Complete {
        downloaded: usize,
        failed_shows: usize,
    },
}

/// Summary of a full run over the show list
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// The show list with advanced checkpoints, in the original order
    pub shows: Vec<Show>,

    /// Number of torrent files saved
    pub downloaded: usize,

    /// Number of shows that could not be checked
    pub failed_shows: usize,
}

/// Top-level error type for TVShows operations
#[derive(Debug, Error)]
pub enum TvShowsError {
    /// Error in the preferences
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error loading or saving a JSON document
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Error in the quality tag configuration
    #[error("Quality configuration error: {0}")]
    Quality(#[from] QualityError),

    /// The feed host cannot be reached
    #[error("Connectivity error: {0}")]
    Connectivity(#[from] ConnectivityError),

    /// Error setting up the feed client
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    /// Error setting up the downloader
    #[error("Download error: {0}")]
    Download(#[from] DownloadError),

    /// Error fetching the show catalog
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

/// Loads and checks the documents a run needs
///
/// Both documents must exist. Missing preferences or a missing show list abort
/// the run, as does a disabled or incomplete configuration.
pub fn load_run_documents(
    preferences: &JsonFile<Preferences>,
    shows: &JsonFile<ShowList>,
) -> Result<(Preferences, ShowList), TvShowsError> {
    let preferences = preferences.load()?;
    preferences.validate()?;

    let show_list = shows.load()?;
    tracing::debug!(
        "Loaded {} show(s) from {}",
        show_list.shows.len(),
        shows.path().display()
    );

    Ok((preferences, show_list))
}

/// Checks every show once and returns the show list with updated checkpoints
///
/// Shows are processed strictly one after another. A show that fails (bad
/// configuration, unreachable feed) keeps its checkpoint and does not affect
/// the others. Nothing is persisted here; the caller saves the returned list
/// in one go.
///
/// # Arguments
///
/// * `runner` - The per-show pipeline (feed, parser, selector, downloader)
/// * `shows` - The show list, unsubscribed shows are skipped
/// * `now` - The reference time for quality delays
/// * `progress_callback` - Closure called with progress events (can be empty for silent operation)
///
/// # Examples
///
/// ```no_run
/// use tvshows::{
///     EpisodeParser, EpisodeSelector, Preferences, ProgressEvent, QualityClassifier,
///     ShowRunner, TorrentDownloader, TvRssFeed, run_cycle,
/// };
///
/// let prefs = Preferences::new("~/Downloads");
/// let feed = TvRssFeed::new(&prefs.feed, &prefs.retry).unwrap();
/// let downloader = TorrentDownloader::new(
///     prefs.resolved_torrent_folder(),
///     false,
///     &prefs.feed.user_agent,
///     prefs.feed.timeout(),
/// )
/// .unwrap();
/// let runner = ShowRunner::new(
///     feed,
///     downloader,
///     EpisodeParser::new(QualityClassifier::default()),
///     EpisodeSelector::default(),
///     prefs.quality,
/// );
///
/// let _report = run_cycle(&runner, &[], chrono::Utc::now(), |event| {
///     if let ProgressEvent::EpisodeDownloaded { path, .. } = event {
///         println!("Saved {}", path.display());
///     }
/// });
/// ```
pub fn run_cycle<F, D, P>(
    runner: &ShowRunner<F, D>,
    shows: &[Show],
    now: DateTime<Utc>,
    mut progress_callback: P,
) -> CycleReport
where
    F: FeedSource,
    D: EpisodeDispatcher,
    P: FnMut(ProgressEvent),
{
    progress_callback(ProgressEvent::Started {
        show_count: shows.len(),
    });

    let total = shows.iter().filter(|s| s.subscribed).count();
    let mut index = 0;
    let mut downloaded = 0;
    let mut failed_shows = 0;
    let mut updated = Vec::with_capacity(shows.len());

    for show in shows {
        if show.subscribed {
            progress_callback(ProgressEvent::CheckingShow {
                index,
                total,
                show_name: show.human_name.clone(),
            });
            index += 1;
        }

        match runner.run(show, now) {
            ShowOutcome::Skipped => {
                progress_callback(ProgressEvent::ShowSkipped {
                    show_name: show.human_name.clone(),
                });
                updated.push(show.clone());
            }
            ShowOutcome::Checked(report) => {
                for episode in &report.downloaded {
                    progress_callback(ProgressEvent::EpisodeDownloaded {
                        show_name: show.human_name.clone(),
                        key: episode.key.clone(),
                        path: episode.path.clone(),
                    });
                }
                for failure in &report.failed {
                    progress_callback(ProgressEvent::DownloadFailed {
                        show_name: show.human_name.clone(),
                        key: failure.key.clone(),
                        reason: failure.reason.clone(),
                    });
                }
                progress_callback(ProgressEvent::ShowChecked {
                    show_name: show.human_name.clone(),
                    checkpoint: report.checkpoint.clone(),
                    pending: report.pending,
                });

                downloaded += report.downloaded.len();
                if report.advanced() {
                    updated.push(show.with_checkpoint(report.checkpoint));
                } else {
                    updated.push(show.clone());
                }
            }
            ShowOutcome::Failed(e) => {
                tracing::error!("Checking '{}' failed: {}", show.human_name, e);
                progress_callback(ProgressEvent::ShowFailed {
                    show_name: show.human_name.clone(),
                    reason: e.to_string(),
                });
                failed_shows += 1;
                updated.push(show.clone());
            }
        }
    }

    progress_callback(ProgressEvent::Complete {
        downloaded,
        failed_shows,
    });

    CycleReport {
        shows: updated,
        downloaded,
        failed_shows,
    }
}
