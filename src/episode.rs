//! Episode records parsed from a show's feed
//!
//! An episode is one release of one logical piece of content. Several
//! releases (in different qualities) can share the same identity key.

use crate::file_naming::sanitize_filename;
use crate::quality::QualityTier;
use crate::show::Show;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of an episode within its show
///
/// Keys of one show always share a variant, so the derived ordering is the
/// natural ordering of that scheme.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EpisodeKey {
    SeasonEpisode { season: u32, episode: u32 },
    Date { date: NaiveDate },
    Time { published: DateTime<Utc> },
}

impl fmt::Display for EpisodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EpisodeKey::SeasonEpisode { season, episode } => {
                write!(f, "S{:02}E{:02}", season, episode)
            }
            EpisodeKey::Date { date } => write!(f, "{}", date.format("%Y-%m-%d")),
            EpisodeKey::Time { published } => write!(f, "{}", published.to_rfc3339()),
        }
    }
}

/// Scheme-specific part of an episode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EpisodeKind {
    SeasonEpisode { season: u32, episode: u32 },
    Dated { date: NaiveDate },
    /// Identified by publication time, the title is informational only
    Timed { title: String },
}

/// A single release found on the feed
#[derive(Debug, Clone, PartialEq)]
pub struct Episode<'s> {
    show: &'s Show,
    url: String,
    published: DateTime<Utc>,
    quality: QualityTier,
    kind: EpisodeKind,
}

impl<'s> Episode<'s> {
    pub fn new(
        show: &'s Show,
        url: impl Into<String>,
        published: DateTime<Utc>,
        quality: QualityTier,
        kind: EpisodeKind,
    ) -> Self {
        Self {
            show,
            url: url.into(),
            published,
            quality,
            kind,
        }
    }

    pub fn show(&self) -> &'s Show {
        self.show
    }

    /// Location of the release payload
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn published(&self) -> DateTime<Utc> {
        self.published
    }

    pub fn quality(&self) -> QualityTier {
        self.quality
    }

    pub fn kind(&self) -> &EpisodeKind {
        &self.kind
    }

    pub fn key(&self) -> EpisodeKey {
        match &self.kind {
            EpisodeKind::SeasonEpisode { season, episode } => EpisodeKey::SeasonEpisode {
                season: *season,
                episode: *episode,
            },
            EpisodeKind::Dated { date } => EpisodeKey::Date { date: *date },
            EpisodeKind::Timed { .. } => EpisodeKey::Time {
                published: self.published,
            },
        }
    }

    /// Name of the downloaded file, without any directory
    ///
    /// - `Lost 03x07.torrent`
    /// - `The Daily Show 2008-01-07.torrent`
    /// - `Discovery Channel Planet Earth 2008-01-07 21h30m05.torrent`
    pub fn file_name(&self) -> String {
        let show_name = sanitize_filename(&self.show.human_name);

        let suffix = match &self.kind {
            EpisodeKind::SeasonEpisode { season, episode } => {
                format!("{:02}x{:02}", season, episode)
            }
            EpisodeKind::Dated { date } => date.format("%Y-%m-%d").to_string(),
            EpisodeKind::Timed { title } => {
                // The timestamp is the key, titles repeat across releases
                let stamp = self.published.format("%Y-%m-%d %Hh%Mm%S").to_string();
                let title = sanitize_filename(title);
                if title.is_empty() {
                    stamp
                } else {
                    format!("{} {}", title, stamp)
                }
            }
        };

        format!("{} {}.torrent", show_name, suffix)
    }
}

impl fmt::Display for Episode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} {}, quality {}]",
            self.show.human_name,
            self.key(),
            self.quality
        )
    }
}
