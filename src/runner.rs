//! Per-show processing
//!
//! Runs fetch, parse, select and download for a single show. Any failure is
//! contained to that show and leaves its checkpoint untouched.

use crate::dispatch::EpisodeDispatcher;
use crate::episode::EpisodeKey;
use crate::feed::{FeedError, FeedSource};
use crate::parser::EpisodeParser;
use crate::quality::QualityTier;
use crate::selector::EpisodeSelector;
use crate::show::{Show, ShowConfigError};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that end the cycle of a single show
#[derive(Debug, Error)]
pub enum ShowError {
    /// The show's own configuration is unusable
    #[error(transparent)]
    Config(#[from] ShowConfigError),

    /// The feed could not be fetched or parsed
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),
}

/// A release that was downloaded during a show's cycle
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadedEpisode {
    pub key: EpisodeKey,
    pub quality: QualityTier,
    pub path: PathBuf,
}

/// A release whose download failed during a show's cycle
#[derive(Debug, Clone, PartialEq)]
pub struct FailedEpisode {
    pub key: EpisodeKey,
    pub reason: String,
}

/// Result of a completed show cycle
#[derive(Debug, Clone, PartialEq)]
pub struct ShowReport {
    pub previous: EpisodeKey,
    pub checkpoint: EpisodeKey,
    pub downloaded: Vec<DownloadedEpisode>,
    pub failed: Vec<FailedEpisode>,
    /// New keys still waiting for the wanted quality
    pub pending: usize,
}

impl ShowReport {
    pub fn advanced(&self) -> bool {
        self.checkpoint > self.previous
    }
}

/// What happened to a show during a run
#[derive(Debug)]
pub enum ShowOutcome {
    /// Not subscribed, nothing was fetched
    Skipped,
    Checked(ShowReport),
    Failed(ShowError),
}

/// Runs the whole pipeline for one show at a time
pub struct ShowRunner<F, D> {
    feed: F,
    dispatcher: D,
    parser: EpisodeParser,
    selector: EpisodeSelector,
    /// Quality ceiling for shows without their own
    default_quality: QualityTier,
}

impl<F, D> ShowRunner<F, D>
where
    F: FeedSource,
    D: EpisodeDispatcher,
{
    pub fn new(
        feed: F,
        dispatcher: D,
        parser: EpisodeParser,
        selector: EpisodeSelector,
        default_quality: QualityTier,
    ) -> Self {
        Self {
            feed,
            dispatcher,
            parser,
            selector,
            default_quality,
        }
    }

    /// Processes one show and reports what happened
    pub fn run(&self, show: &Show, now: DateTime<Utc>) -> ShowOutcome {
        if !show.subscribed {
            debug!("Skipping unsubscribed show '{}'", show.human_name);
            return ShowOutcome::Skipped;
        }

        match self.check(show, now) {
            Ok(report) => ShowOutcome::Checked(report),
            Err(e) => ShowOutcome::Failed(e),
        }
    }

    fn check(&self, show: &Show, now: DateTime<Utc>) -> Result<ShowReport, ShowError> {
        let scheme = show.organization()?;
        let previous = show.current_checkpoint()?;

        let items = self.feed.fetch(&show.exact_name)?;
        let episodes = self.parser.parse(show, scheme, &items);
        debug!(
            "'{}': {} of {} feed item(s) parsed",
            show.human_name,
            episodes.len(),
            items.len()
        );

        let selection = self.selector.select(
            &episodes,
            &previous,
            show.quality_ceiling(self.default_quality),
            now,
            &self.dispatcher,
        );

        if selection.checkpoint > previous {
            info!(
                "'{}' advanced from {} to {}",
                show.human_name, previous, selection.checkpoint
            );
        }

        Ok(ShowReport {
            previous,
            checkpoint: selection.checkpoint,
            downloaded: selection
                .downloaded
                .into_iter()
                .map(|d| DownloadedEpisode {
                    key: d.key,
                    quality: d.episode.quality(),
                    path: d.path,
                })
                .collect(),
            failed: selection
                .failed
                .into_iter()
                .map(|f| FailedEpisode {
                    key: f.key,
                    reason: f.error.to_string(),
                })
                .collect(),
            pending: selection.pending.len(),
        })
    }
}
