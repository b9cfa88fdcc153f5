//! Episode selection
//!
//! Given everything the feed currently lists for a show, decide which
//! releases to download and how far the show's checkpoint may advance.
//!
//! Releases are grouped by their identity key. Only groups newer than the
//! checkpoint are considered, and at most one release is taken per group:
//!
//! 1. The wanted quality is the best quality among the most recent releases,
//!    capped by the user's ceiling.
//! 2. A group offering exactly the wanted quality is taken right away.
//! 3. Otherwise the group waits `6h * wanted quality` after its first release
//!    before settling for the best release not above the wanted quality.
//!
//! The checkpoint only moves to keys whose download succeeded, so failed
//! downloads are retried on the next run.

use crate::dispatch::{DownloadError, EpisodeDispatcher};
use crate::episode::{Episode, EpisodeKey};
use crate::quality::QualityTier;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Number of most recent releases used to estimate the available quality
pub const QUALITY_WINDOW: usize = 7;

/// Hours to wait per wanted quality tier before falling back
pub const DELAY_HOURS_PER_TIER: i64 = 6;

/// Why a release was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionReason {
    /// The group offers exactly the wanted quality
    WantedQuality,
    /// The group waited long enough for the wanted quality
    DelayExpired,
}

/// A release chosen for download
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate<'a> {
    pub key: EpisodeKey,
    pub episode: &'a Episode<'a>,
    pub reason: SelectionReason,
}

/// The outcome of planning, before anything is downloaded
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionPlan<'a> {
    /// `min(best quality in window, ceiling)`
    pub wanted_quality: QualityTier,
    pub quality_delay: TimeDelta,
    /// Wanted-quality candidates first, then fallbacks, each in key order
    pub candidates: Vec<Candidate<'a>>,
    /// New keys still waiting for the wanted quality
    pub pending: Vec<EpisodeKey>,
}

/// A successfully downloaded release
#[derive(Debug, Clone, PartialEq)]
pub struct Downloaded<'a> {
    pub key: EpisodeKey,
    pub episode: &'a Episode<'a>,
    pub path: PathBuf,
}

/// A release whose download failed
#[derive(Debug)]
pub struct FailedDownload<'a> {
    pub key: EpisodeKey,
    pub episode: &'a Episode<'a>,
    pub error: DownloadError,
}

/// The outcome of a selection run
#[derive(Debug)]
pub struct Selection<'a> {
    pub checkpoint: EpisodeKey,
    pub downloaded: Vec<Downloaded<'a>>,
    pub failed: Vec<FailedDownload<'a>>,
    pub pending: Vec<EpisodeKey>,
}

/// Chooses which releases to download
#[derive(Debug, Clone)]
pub struct EpisodeSelector {
    window: usize,
    delay_per_tier: TimeDelta,
}

impl Default for EpisodeSelector {
    fn default() -> Self {
        Self {
            window: QUALITY_WINDOW,
            delay_per_tier: TimeDelta::hours(DELAY_HOURS_PER_TIER),
        }
    }
}

impl EpisodeSelector {
    pub fn new(window: usize, delay_per_tier: TimeDelta) -> Self {
        Self {
            window: window.max(1),
            delay_per_tier,
        }
    }

    /// Best quality among the `window` most recently published releases
    fn window_quality(&self, episodes: &[Episode<'_>]) -> QualityTier {
        let mut by_time: Vec<&Episode<'_>> = episodes.iter().collect();
        by_time.sort_by_key(|ep| ep.published());

        by_time
            .iter()
            .rev()
            .take(self.window)
            .map(|ep| ep.quality())
            .max()
            .unwrap_or(0)
    }

    /// Plans the downloads without performing them
    ///
    /// Returns `None` when there are no episodes at all.
    pub fn plan<'a>(
        &self,
        episodes: &'a [Episode<'a>],
        checkpoint: &EpisodeKey,
        quality_ceiling: QualityTier,
        now: DateTime<Utc>,
    ) -> Option<SelectionPlan<'a>> {
        if episodes.is_empty() {
            return None;
        }

        let wanted_quality = self.window_quality(episodes).min(quality_ceiling);
        let quality_delay = self.delay_per_tier * i32::from(wanted_quality);

        // Keys newer than the checkpoint, in key order
        let mut groups: BTreeMap<EpisodeKey, Vec<&'a Episode<'a>>> = BTreeMap::new();
        for episode in episodes {
            let key = episode.key();
            if key > *checkpoint {
                groups.entry(key).or_default().push(episode);
            }
        }

        let mut candidates = Vec::new();
        let mut waiting = Vec::new();

        for (key, group) in groups {
            let exact = group.iter().copied().find(|ep| ep.quality() == wanted_quality);
            match exact {
                Some(episode) => candidates.push(Candidate {
                    key,
                    episode,
                    reason: SelectionReason::WantedQuality,
                }),
                None => waiting.push((key, group)),
            }
        }

        let mut pending = Vec::new();

        for (key, group) in waiting {
            let first_published = group
                .iter()
                .map(|ep| ep.published())
                .min()
                .unwrap_or(now);

            if now - first_published > quality_delay {
                if let Some(episode) = fallback(&group, wanted_quality) {
                    candidates.push(Candidate {
                        key,
                        episode,
                        reason: SelectionReason::DelayExpired,
                    });
                }
            } else {
                pending.push(key);
            }
        }

        Some(SelectionPlan {
            wanted_quality,
            quality_delay,
            candidates,
            pending,
        })
    }

    /// Plans and performs the downloads, returning the new checkpoint
    ///
    /// Downloads happen one at a time in plan order. The checkpoint becomes
    /// the greatest key that was downloaded successfully and never moves
    /// backwards.
    pub fn select<'a, D>(
        &self,
        episodes: &'a [Episode<'a>],
        checkpoint: &EpisodeKey,
        quality_ceiling: QualityTier,
        now: DateTime<Utc>,
        dispatcher: &D,
    ) -> Selection<'a>
    where
        D: EpisodeDispatcher + ?Sized,
    {
        let Some(plan) = self.plan(episodes, checkpoint, quality_ceiling, now) else {
            return Selection {
                checkpoint: checkpoint.clone(),
                downloaded: Vec::new(),
                failed: Vec::new(),
                pending: Vec::new(),
            };
        };

        debug!(
            "Wanted quality {}, quality delay {}h, {} candidate(s), {} pending",
            plan.wanted_quality,
            plan.quality_delay.num_hours(),
            plan.candidates.len(),
            plan.pending.len()
        );

        let mut downloaded = Vec::new();
        let mut failed = Vec::new();

        for candidate in plan.candidates {
            match dispatcher.dispatch(candidate.episode) {
                Ok(path) => {
                    info!("Downloaded {} ({:?})", candidate.episode, candidate.reason);
                    downloaded.push(Downloaded {
                        key: candidate.key,
                        episode: candidate.episode,
                        path,
                    });
                }
                Err(error) => {
                    warn!("Download of {} failed: {}", candidate.episode, error);
                    failed.push(FailedDownload {
                        key: candidate.key,
                        episode: candidate.episode,
                        error,
                    });
                }
            }
        }

        let checkpoint = downloaded
            .iter()
            .map(|d| &d.key)
            .max()
            .filter(|key| *key > checkpoint)
            .unwrap_or(checkpoint)
            .clone();

        Selection {
            checkpoint,
            downloaded,
            failed,
            pending: plan.pending,
        }
    }
}

/// Best release not above the wanted quality, else the lowest one
///
/// Equal qualities go to the release published first.
fn fallback<'a>(group: &[&'a Episode<'a>], wanted: QualityTier) -> Option<&'a Episode<'a>> {
    let closest = group
        .iter()
        .filter(|ep| ep.quality() <= wanted)
        .min_by_key(|ep| (std::cmp::Reverse(ep.quality()), ep.published()));

    closest
        .or_else(|| {
            group
                .iter()
                .min_by_key(|ep| (ep.quality(), ep.published()))
        })
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::episode::EpisodeKind;
    use crate::show::{OrganizationScheme, Show};
    use chrono::{NaiveDate, TimeZone};
    use std::cell::RefCell;
    use std::collections::HashSet;

    /// Records dispatched episodes, failing for the configured keys
    #[derive(Default)]
    struct RecordingDispatcher {
        fail: HashSet<EpisodeKey>,
        calls: RefCell<Vec<(EpisodeKey, QualityTier)>>,
    }

    impl RecordingDispatcher {
        fn failing(keys: &[EpisodeKey]) -> Self {
            Self {
                fail: keys.iter().cloned().collect(),
                calls: RefCell::default(),
            }
        }

        fn calls(&self) -> Vec<(EpisodeKey, QualityTier)> {
            self.calls.borrow().clone()
        }
    }

    impl EpisodeDispatcher for RecordingDispatcher {
        fn dispatch(&self, episode: &Episode<'_>) -> Result<PathBuf, DownloadError> {
            let key = episode.key();
            self.calls.borrow_mut().push((key.clone(), episode.quality()));

            if self.fail.contains(&key) {
                Err(DownloadError::EmptyResponse(episode.url().to_string()))
            } else {
                Ok(PathBuf::from(episode.file_name()))
            }
        }
    }

    fn show() -> Show {
        Show::new("Lost", "Lost", OrganizationScheme::SeasonEpisode)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2007, 3, 8, 4, 0, 0).unwrap()
    }

    fn hours(h: i64) -> TimeDelta {
        TimeDelta::hours(h)
    }

    fn se(season: u32, episode: u32) -> EpisodeKey {
        EpisodeKey::SeasonEpisode { season, episode }
    }

    fn release<'s>(
        show: &'s Show,
        season: u32,
        episode: u32,
        quality: QualityTier,
        published: DateTime<Utc>,
    ) -> Episode<'s> {
        Episode::new(
            show,
            format!("http://example.com/{}x{}-q{}.torrent", season, episode, quality),
            published,
            quality,
            EpisodeKind::SeasonEpisode { season, episode },
        )
    }

    #[test]
    fn test_empty_feed_changes_nothing() {
        let selector = EpisodeSelector::default();
        let dispatcher = RecordingDispatcher::default();

        assert!(selector.plan(&[], &se(1, 1), 2, t0()).is_none());

        let selection = selector.select(&[], &se(1, 1), 2, t0(), &dispatcher);
        assert_eq!(selection.checkpoint, se(1, 1));
        assert!(selection.downloaded.is_empty());
        assert!(dispatcher.calls().is_empty());
    }

    #[test]
    fn test_exact_quality_is_taken_immediately() {
        let show = show();
        let episodes = vec![
            release(&show, 1, 1, 0, t0()),
            release(&show, 1, 1, 2, t0() + hours(1)),
        ];
        let dispatcher = RecordingDispatcher::default();

        let selection =
            EpisodeSelector::default().select(&episodes, &se(0, 0), 2, t0() + hours(1), &dispatcher);

        assert_eq!(selection.checkpoint, se(1, 1));
        assert_eq!(dispatcher.calls(), vec![(se(1, 1), 2)]);
        assert_eq!(selection.downloaded.len(), 1);
        assert_eq!(selection.downloaded[0].episode.quality(), 2);
    }

    #[test]
    fn test_low_quality_window_means_no_delay() {
        let show = show();
        let episodes = vec![release(&show, 2, 1, 0, t0())];
        let dispatcher = RecordingDispatcher::default();
        let selector = EpisodeSelector::default();

        let plan = selector.plan(&episodes, &se(1, 5), 2, t0()).unwrap();
        assert_eq!(plan.wanted_quality, 0);
        assert_eq!(plan.quality_delay, TimeDelta::zero());

        let selection = selector.select(&episodes, &se(1, 5), 2, t0(), &dispatcher);
        assert_eq!(selection.checkpoint, se(2, 1));
    }

    /// Older high quality releases make 720p the wanted quality
    fn waiting_for_720p(show: &Show) -> Vec<Episode<'_>> {
        vec![
            release(show, 2, 22, 2, t0() - hours(170)),
            release(show, 2, 23, 2, t0() - hours(2)),
            release(show, 3, 1, 0, t0()),
        ]
    }

    #[test]
    fn test_group_waits_within_quality_delay() {
        let show = show();
        let episodes = waiting_for_720p(&show);
        let dispatcher = RecordingDispatcher::default();
        let selector = EpisodeSelector::default();

        let plan = selector
            .plan(&episodes, &se(2, 23), 2, t0() + hours(1))
            .unwrap();
        assert_eq!(plan.wanted_quality, 2);
        assert_eq!(plan.quality_delay, hours(12));
        assert!(plan.candidates.is_empty());
        assert_eq!(plan.pending, vec![se(3, 1)]);

        let selection = selector.select(&episodes, &se(2, 23), 2, t0() + hours(1), &dispatcher);
        assert_eq!(selection.checkpoint, se(2, 23));
        assert!(dispatcher.calls().is_empty());
    }

    #[test]
    fn test_group_falls_back_after_quality_delay() {
        let show = show();
        let episodes = waiting_for_720p(&show);
        let dispatcher = RecordingDispatcher::default();

        let selection = EpisodeSelector::default().select(
            &episodes,
            &se(2, 23),
            2,
            t0() + hours(13),
            &dispatcher,
        );

        assert_eq!(selection.checkpoint, se(3, 1));
        assert_eq!(dispatcher.calls(), vec![(se(3, 1), 0)]);
    }

    #[test]
    fn test_delay_must_be_strictly_exceeded() {
        let show = show();
        let episodes = waiting_for_720p(&show);

        let plan = EpisodeSelector::default()
            .plan(&episodes, &se(2, 23), 2, t0() + hours(12))
            .unwrap();

        assert!(plan.candidates.is_empty());
        assert_eq!(plan.pending, vec![se(3, 1)]);
    }

    #[test]
    fn test_fallback_prefers_closest_quality_not_above_wanted() {
        let show = show();
        let episodes = vec![
            release(&show, 1, 1, 0, t0()),
            release(&show, 1, 1, 1, t0() + hours(1)),
            release(&show, 1, 1, 3, t0() + hours(2)),
        ];

        // Window sees quality 3, ceiling caps wanted quality at 2
        let plan = EpisodeSelector::default()
            .plan(&episodes, &se(0, 0), 2, t0() + hours(20))
            .unwrap();

        assert_eq!(plan.wanted_quality, 2);
        assert_eq!(plan.candidates.len(), 1);
        assert_eq!(plan.candidates[0].episode.quality(), 1);
        assert_eq!(plan.candidates[0].reason, SelectionReason::DelayExpired);
    }

    #[test]
    fn test_fallback_takes_lowest_when_everything_exceeds_wanted() {
        let show = show();
        let episodes = vec![
            release(&show, 1, 1, 3, t0()),
            release(&show, 1, 1, 2, t0() + hours(1)),
        ];

        // Ceiling 1 is below every available release
        let plan = EpisodeSelector::default()
            .plan(&episodes, &se(0, 0), 1, t0() + hours(7))
            .unwrap();

        assert_eq!(plan.wanted_quality, 1);
        assert_eq!(plan.candidates.len(), 1);
        assert_eq!(plan.candidates[0].episode.quality(), 2);
    }

    #[test]
    fn test_fallback_tie_goes_to_first_published() {
        let show = show();
        let episodes = vec![
            release(&show, 5, 5, 2, t0() - hours(30)),
            release(&show, 1, 1, 1, t0() + hours(1)),
            release(&show, 1, 1, 1, t0()),
        ];

        let plan = EpisodeSelector::default()
            .plan(&episodes, &se(0, 0), 2, t0() + hours(13))
            .unwrap();

        let candidate = plan
            .candidates
            .iter()
            .find(|c| c.key == se(1, 1))
            .unwrap();
        assert_eq!(candidate.episode.published(), t0());
    }

    #[test]
    fn test_window_only_considers_last_seven_releases() {
        let show = show();
        let mut episodes = vec![release(&show, 1, 1, 2, t0())];
        for n in 2..=8 {
            episodes.push(release(&show, 1, n, 0, t0() + hours(i64::from(n))));
        }

        let plan = EpisodeSelector::default()
            .plan(&episodes, &se(1, 8), 2, t0() + hours(9))
            .unwrap();
        assert_eq!(plan.wanted_quality, 0);

        // With one release less the 720p release is inside the window
        let plan = EpisodeSelector::default()
            .plan(&episodes[..7], &se(1, 8), 2, t0() + hours(9))
            .unwrap();
        assert_eq!(plan.wanted_quality, 2);
    }

    #[test]
    fn test_ceiling_caps_wanted_quality() {
        let show = show();
        let episodes = vec![
            release(&show, 1, 1, 2, t0()),
            release(&show, 1, 1, 1, t0()),
        ];
        let dispatcher = RecordingDispatcher::default();

        let selection =
            EpisodeSelector::default().select(&episodes, &se(0, 0), 1, t0(), &dispatcher);

        assert_eq!(dispatcher.calls(), vec![(se(1, 1), 1)]);
        assert_eq!(selection.checkpoint, se(1, 1));
    }

    #[test]
    fn test_old_keys_are_ignored() {
        let show = show();
        let episodes = vec![
            release(&show, 1, 1, 0, t0()),
            release(&show, 1, 2, 0, t0()),
        ];
        let dispatcher = RecordingDispatcher::default();

        let selection = EpisodeSelector::default().select(
            &episodes,
            &se(1, 2),
            0,
            t0() + hours(100),
            &dispatcher,
        );

        assert_eq!(selection.checkpoint, se(1, 2));
        assert!(selection.downloaded.is_empty());
        assert!(selection.pending.is_empty());
        assert!(dispatcher.calls().is_empty());
    }

    #[test]
    fn test_failed_download_keeps_checkpoint_and_is_proposed_again() {
        let show = show();
        let episodes = vec![
            release(&show, 1, 1, 0, t0()),
            release(&show, 1, 2, 0, t0()),
        ];
        let dispatcher = RecordingDispatcher::failing(&[se(1, 1), se(1, 2)]);
        let selector = EpisodeSelector::default();

        let first = selector.select(&episodes, &se(0, 0), 0, t0(), &dispatcher);
        assert_eq!(first.checkpoint, se(0, 0));
        assert_eq!(first.failed.len(), 2);

        let second = selector.select(&episodes, &first.checkpoint, 0, t0(), &dispatcher);
        assert_eq!(second.checkpoint, se(0, 0));
        assert_eq!(
            dispatcher.calls(),
            vec![(se(1, 1), 0), (se(1, 2), 0), (se(1, 1), 0), (se(1, 2), 0)]
        );
    }

    #[test]
    fn test_checkpoint_is_greatest_successful_key() {
        let show = show();
        let episodes = vec![
            release(&show, 1, 1, 0, t0()),
            release(&show, 1, 2, 0, t0()),
            release(&show, 1, 3, 0, t0()),
        ];
        let dispatcher = RecordingDispatcher::failing(&[se(1, 3)]);

        let selection =
            EpisodeSelector::default().select(&episodes, &se(0, 0), 0, t0(), &dispatcher);

        assert_eq!(selection.checkpoint, se(1, 2));
        assert_eq!(selection.downloaded.len(), 2);
        assert_eq!(selection.failed[0].key, se(1, 3));
    }

    #[test]
    fn test_wanted_quality_candidates_are_dispatched_first() {
        let show = show();
        let episodes = vec![
            release(&show, 1, 1, 0, t0() - hours(20)),
            release(&show, 1, 2, 2, t0()),
        ];
        let dispatcher = RecordingDispatcher::default();

        EpisodeSelector::default().select(&episodes, &se(0, 0), 2, t0(), &dispatcher);

        assert_eq!(dispatcher.calls(), vec![(se(1, 2), 2), (se(1, 1), 0)]);
    }

    #[test]
    fn test_checkpoint_never_decreases() {
        let show = show();
        let checkpoints = [se(0, 0), se(1, 1), se(2, 5), se(9, 9)];
        let episodes = vec![
            release(&show, 1, 1, 0, t0()),
            release(&show, 2, 5, 1, t0() + hours(1)),
            release(&show, 3, 1, 2, t0() + hours(2)),
        ];

        for checkpoint in &checkpoints {
            for ceiling in 0..=3 {
                for now in [t0(), t0() + hours(30)] {
                    let dispatcher = RecordingDispatcher::default();
                    let selection = EpisodeSelector::default()
                        .select(&episodes, checkpoint, ceiling, now, &dispatcher);
                    assert!(selection.checkpoint >= *checkpoint);
                }
            }
        }
    }

    #[test]
    fn test_exact_pass_never_exceeds_wanted_quality() {
        let show = show();
        let episodes = vec![
            release(&show, 1, 1, 0, t0()),
            release(&show, 1, 1, 1, t0()),
            release(&show, 1, 1, 2, t0()),
        ];

        for ceiling in 0..=3 {
            let plan = EpisodeSelector::default()
                .plan(&episodes, &se(0, 0), ceiling, t0())
                .unwrap();
            for candidate in &plan.candidates {
                assert!(candidate.episode.quality() <= ceiling.min(2));
            }
        }
    }

    #[test]
    fn test_dated_show() {
        let show = Show::new("The Daily Show", "The Daily Show", OrganizationScheme::Date);
        let day = |d| NaiveDate::from_ymd_opt(2008, 1, d).unwrap();
        let episodes: Vec<Episode<'_>> = (7..=9)
            .map(|d| {
                Episode::new(
                    &show,
                    format!("http://example.com/{}.torrent", d),
                    t0() + hours(i64::from(d)),
                    0,
                    EpisodeKind::Dated { date: day(d) },
                )
            })
            .collect();
        let dispatcher = RecordingDispatcher::default();

        let selection = EpisodeSelector::default().select(
            &episodes,
            &EpisodeKey::Date { date: day(7) },
            0,
            t0() + hours(24),
            &dispatcher,
        );

        assert_eq!(selection.checkpoint, EpisodeKey::Date { date: day(9) });
        assert_eq!(selection.downloaded.len(), 2);
    }

    #[test]
    fn test_timed_show_groups_by_publication_time() {
        let show = Show::new("Discovery", "Discovery Channel", OrganizationScheme::Time);
        let timed = |published, quality| {
            Episode::new(
                &show,
                "http://example.com/d.torrent",
                published,
                quality,
                EpisodeKind::Timed {
                    title: String::new(),
                },
            )
        };
        let episodes = vec![timed(t0(), 0), timed(t0(), 1), timed(t0() + hours(1), 0)];
        let dispatcher = RecordingDispatcher::default();

        let selection = EpisodeSelector::default().select(
            &episodes,
            &OrganizationScheme::Time.origin(),
            0,
            t0() + hours(2),
            &dispatcher,
        );

        assert_eq!(selection.downloaded.len(), 2);
        assert_eq!(
            selection.checkpoint,
            EpisodeKey::Time {
                published: t0() + hours(1)
            }
        );
    }
}
