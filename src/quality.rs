//! Release quality classification
//!
//! Release titles on the feed carry bracketed tags such as `[720p]` or `[HR]`.
//! This module maps a title onto an ordinal quality tier by testing it against
//! ordered groups of tag patterns.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Quality tier of a release. Higher is better, 0 is the default.
pub type QualityTier = u8;

/// Errors that can occur while building a classifier
#[derive(Debug, Error)]
pub enum QualityError {
    /// A configured tag pattern is not a valid regular expression
    #[error("Invalid quality tag pattern '{pattern}' for tier {tier}: {source}")]
    InvalidPattern {
        tier: QualityTier,
        pattern: String,
        source: regex::Error,
    },
}

/// A group of tag patterns that all map to the same tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityTagGroup {
    /// The tier assigned when any pattern matches
    pub tier: QualityTier,
    /// Case-insensitive regular expressions tested against the title
    pub patterns: Vec<String>,
}

impl QualityTagGroup {
    pub fn new(tier: QualityTier, patterns: &[&str]) -> Self {
        Self {
            tier,
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// The tag groups used by tvrss.net releases, highest tier first
pub fn default_tag_groups() -> Vec<QualityTagGroup> {
    vec![
        QualityTagGroup::new(2, &[r"\[720p"]),
        QualityTagGroup::new(1, &[r"\[HR"]),
        QualityTagGroup::new(0, &[r"\[HD", r"\[DSRIP", r"\[TVRIP", r"\[PDTV", r"\[DVD"]),
    ]
}

/// Maps release titles to quality tiers
#[derive(Debug, Clone)]
pub struct QualityClassifier {
    /// Compiled groups, sorted by tier, highest first
    groups: Vec<(QualityTier, Vec<Regex>)>,
}

impl QualityClassifier {
    /// Compiles the given tag groups
    ///
    /// Groups are checked highest tier first no matter how they are ordered
    /// in the configuration.
    pub fn new(groups: &[QualityTagGroup]) -> Result<Self, QualityError> {
        let mut compiled = Vec::with_capacity(groups.len());

        for group in groups {
            let patterns = group
                .patterns
                .iter()
                .map(|pattern| {
                    RegexBuilder::new(pattern)
                        .case_insensitive(true)
                        .build()
                        .map_err(|source| QualityError::InvalidPattern {
                            tier: group.tier,
                            pattern: pattern.clone(),
                            source,
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            compiled.push((group.tier, patterns));
        }

        // Stable sort keeps configuration order among equal tiers
        compiled.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(Self { groups: compiled })
    }

    /// Returns the tier of the first group with a pattern matching `title`,
    /// or 0 when nothing matches.
    pub fn classify(&self, title: &str) -> QualityTier {
        self.groups
            .iter()
            .find(|(_, patterns)| patterns.iter().any(|p| p.is_match(title)))
            .map(|(tier, _)| *tier)
            .unwrap_or(0)
    }
}

impl Default for QualityClassifier {
    fn default() -> Self {
        Self::new(&default_tag_groups()).expect("default quality tags are valid")
    }
}
