//! Subscribed shows and their organization schemes
//!
//! A show is identified on the feed by its exact search name. How its
//! episodes are told apart depends on how the show is organized, which also
//! decides the type of the checkpoint stored for it.

use crate::episode::EpisodeKey;
use crate::quality::QualityTier;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Per-show configuration problems
#[derive(Debug, Error, PartialEq)]
pub enum ShowConfigError {
    /// The show is subscribed but was never assigned an organization scheme
    #[error("Show '{0}' has no organization scheme")]
    MissingScheme(String),

    /// The stored checkpoint belongs to another scheme
    #[error("Show '{show}' is organized by {scheme} but its checkpoint is {checkpoint}")]
    CheckpointMismatch {
        show: String,
        scheme: OrganizationScheme,
        checkpoint: EpisodeKey,
    },
}

/// How the episodes of a show are identified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganizationScheme {
    /// Numbered seasons and episodes (e.g. "Lost")
    SeasonEpisode,
    /// One episode per air date (e.g. "The Daily Show")
    Date,
    /// No structure at all, episodes are told apart by publication time
    Time,
}

impl OrganizationScheme {
    /// The checkpoint a show starts from before anything was downloaded
    pub fn origin(self) -> EpisodeKey {
        match self {
            OrganizationScheme::SeasonEpisode => EpisodeKey::SeasonEpisode {
                season: 0,
                episode: 0,
            },
            OrganizationScheme::Date => EpisodeKey::Date {
                date: NaiveDate::MIN,
            },
            OrganizationScheme::Time => EpisodeKey::Time {
                published: DateTime::<Utc>::MIN_UTC,
            },
        }
    }

    /// Whether `key` is a key of this scheme
    pub fn accepts(self, key: &EpisodeKey) -> bool {
        matches!(
            (self, key),
            (OrganizationScheme::SeasonEpisode, EpisodeKey::SeasonEpisode { .. })
                | (OrganizationScheme::Date, EpisodeKey::Date { .. })
                | (OrganizationScheme::Time, EpisodeKey::Time { .. })
        )
    }
}

impl fmt::Display for OrganizationScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrganizationScheme::SeasonEpisode => write!(f, "season/episode"),
            OrganizationScheme::Date => write!(f, "date"),
            OrganizationScheme::Time => write!(f, "publication time"),
        }
    }
}

/// A show as stored in the show list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Show {
    /// Name used to search the feed, must match exactly
    pub exact_name: String,
    /// Name used for display and for downloaded file names
    pub human_name: String,
    /// Only subscribed shows are checked
    #[serde(default)]
    pub subscribed: bool,
    /// Shows imported from the catalog have no scheme until configured
    #[serde(default)]
    pub scheme: Option<OrganizationScheme>,
    /// Overrides the global quality preference for this show
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<QualityTier>,
    /// Latest key that was downloaded successfully
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<EpisodeKey>,
}

impl Show {
    /// Creates a subscribed show without a checkpoint
    pub fn new(exact_name: &str, human_name: &str, scheme: OrganizationScheme) -> Self {
        Self {
            exact_name: exact_name.to_string(),
            human_name: human_name.to_string(),
            subscribed: true,
            scheme: Some(scheme),
            quality: None,
            checkpoint: None,
        }
    }

    /// Returns the organization scheme, failing for unconfigured shows
    pub fn organization(&self) -> Result<OrganizationScheme, ShowConfigError> {
        self.scheme
            .ok_or_else(|| ShowConfigError::MissingScheme(self.exact_name.clone()))
    }

    /// Returns the effective checkpoint for this show
    ///
    /// Shows that never downloaded anything start from the scheme's origin.
    pub fn current_checkpoint(&self) -> Result<EpisodeKey, ShowConfigError> {
        let scheme = self.organization()?;

        match &self.checkpoint {
            None => Ok(scheme.origin()),
            Some(key) if scheme.accepts(key) => Ok(key.clone()),
            Some(key) => Err(ShowConfigError::CheckpointMismatch {
                show: self.exact_name.clone(),
                scheme,
                checkpoint: key.clone(),
            }),
        }
    }

    /// The quality ceiling to use, falling back to the global preference
    pub fn quality_ceiling(&self, default: QualityTier) -> QualityTier {
        self.quality.unwrap_or(default)
    }

    /// Returns a copy of this show carrying the given checkpoint
    pub fn with_checkpoint(&self, checkpoint: EpisodeKey) -> Self {
        Self {
            checkpoint: Some(checkpoint),
            ..self.clone()
        }
    }
}
