//! Episode parsing
//!
//! Turns raw feed items into typed episodes according to the show's
//! organization scheme. The identifying fields are read from markers in the
//! item description, for example:
//!
//! - `Show Name: Lost; Show Title: Not in Portland; Season: 3; Episode: 7`
//! - `Show Name: The Daily Show; Episode Date: 2008-01-07`
//!
//! Items that lack a required marker are skipped with a warning.

use crate::episode::{Episode, EpisodeKind};
use crate::feed::FeedItem;
use crate::quality::QualityClassifier;
use crate::show::{OrganizationScheme, Show};
use chrono::NaiveDate;
use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;
use tracing::warn;

static SEASON_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Season\s*:\s*([0-9]+)\s*;").expect("valid season regex"));

static EPISODE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)Episode\s*:\s*([0-9]+)\s*$").expect("valid episode regex"));

static DATE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)Episode\s*Date\s*:\s*([0-9\-]+)\s*$").expect("valid date regex")
});

static TITLE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Show\s*Title\s*:\s*(.*?);").expect("valid title regex"));

/// Parses feed items into episodes
pub struct EpisodeParser {
    classifier: QualityClassifier,
}

impl EpisodeParser {
    pub fn new(classifier: QualityClassifier) -> Self {
        Self { classifier }
    }

    /// Parses all items of a show's feed
    ///
    /// Returns only the items that could be identified under `scheme`.
    pub fn parse<'s>(
        &self,
        show: &'s Show,
        scheme: OrganizationScheme,
        items: &[FeedItem],
    ) -> Vec<Episode<'s>> {
        items
            .iter()
            .filter_map(|item| self.parse_item(show, scheme, item))
            .collect()
    }

    fn parse_item<'s>(
        &self,
        show: &'s Show,
        scheme: OrganizationScheme,
        item: &FeedItem,
    ) -> Option<Episode<'s>> {
        let description = plain_text(&item.description);

        let kind = match scheme {
            OrganizationScheme::SeasonEpisode => {
                let season = capture_number(&SEASON_MARKER, &description);
                let episode = capture_number(&EPISODE_MARKER, &description);

                match (season, episode) {
                    (Some(season), Some(episode)) => EpisodeKind::SeasonEpisode { season, episode },
                    _ => {
                        warn!(
                            "Skipping '{}': unable to match season and/or episode",
                            item.title
                        );
                        return None;
                    }
                }
            }
            OrganizationScheme::Date => {
                let date = DATE_MARKER
                    .captures(&description)
                    .and_then(|c| parse_date(&c[1]));

                match date {
                    Some(date) => EpisodeKind::Dated { date },
                    None => {
                        warn!("Skipping '{}': unable to match episode date", item.title);
                        return None;
                    }
                }
            }
            OrganizationScheme::Time => {
                let title = match TITLE_MARKER.captures(&description) {
                    Some(c) => c[1].trim().to_string(),
                    None => {
                        warn!("No show title for '{}', keeping it untitled", item.title);
                        String::new()
                    }
                };

                EpisodeKind::Timed { title }
            }
        };

        Some(Episode::new(
            show,
            item.link.clone(),
            item.published,
            self.classifier.classify(&item.title),
            kind,
        ))
    }
}

/// Flattens HTML descriptions so the markers can be found
fn plain_text(description: &str) -> Cow<'_, str> {
    if description.contains('<') {
        Cow::Owned(nanohtml2text::html2text(description))
    } else {
        Cow::Borrowed(description)
    }
}

fn capture_number(marker: &Regex, text: &str) -> Option<u32> {
    marker.captures(text).and_then(|c| c[1].parse().ok())
}

/// Parses `YYYY-MM-DD`, zero padding is optional
fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn item(title: &str, description: &str) -> FeedItem {
        FeedItem {
            title: title.to_string(),
            link: format!("http://example.com/{}.torrent", title.len()),
            published: published(),
            description: description.to_string(),
        }
    }

    fn published() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2008, 1, 7, 22, 0, 0).unwrap()
    }

    fn parser() -> EpisodeParser {
        EpisodeParser::new(QualityClassifier::default())
    }

    #[test]
    fn test_season_episode_items() {
        let show = Show::new("Lost", "Lost", OrganizationScheme::SeasonEpisode);
        let items = vec![
            item(
                "Lost 3x07 [720p - HDTV]",
                "Show Name: Lost; Show Title: Not in Portland; Season: 3; Episode: 7",
            ),
            item("Lost 3x08 [HR - HDTV]", "Season : 3; Episode : 8\n"),
        ];

        let episodes = parser().parse(&show, OrganizationScheme::SeasonEpisode, &items);

        assert_eq!(episodes.len(), 2);
        assert_eq!(
            episodes[0].kind(),
            &EpisodeKind::SeasonEpisode {
                season: 3,
                episode: 7
            }
        );
        assert_eq!(episodes[0].quality(), 2);
        assert_eq!(episodes[0].url(), items[0].link);
        assert_eq!(episodes[0].published(), published());
        assert_eq!(
            episodes[1].kind(),
            &EpisodeKind::SeasonEpisode {
                season: 3,
                episode: 8
            }
        );
        assert_eq!(episodes[1].quality(), 1);
    }

    #[test]
    fn test_items_without_season_or_episode_are_skipped() {
        let show = Show::new("Lost", "Lost", OrganizationScheme::SeasonEpisode);
        let items = vec![
            item("Lost special", "Show Name: Lost; Show Title: Recap"),
            item("Lost 3x07", "Season: 3; Show Title: Not in Portland"),
            item("Lost 3x08", "Episode: 8"),
            item("Lost 3x09", "Season: 3; Episode: 9"),
        ];

        let episodes = parser().parse(&show, OrganizationScheme::SeasonEpisode, &items);

        assert_eq!(episodes.len(), 1);
        assert_eq!(
            episodes[0].kind(),
            &EpisodeKind::SeasonEpisode {
                season: 3,
                episode: 9
            }
        );
    }

    #[test]
    fn test_episode_date_is_not_an_episode_number() {
        let show = Show::new("Lost", "Lost", OrganizationScheme::SeasonEpisode);
        let items = vec![item("Daily", "Season: 1; Episode Date: 2008-01-07")];

        assert!(
            parser()
                .parse(&show, OrganizationScheme::SeasonEpisode, &items)
                .is_empty()
        );
    }

    #[test]
    fn test_dated_items() {
        let show = Show::new("The Daily Show", "The Daily Show", OrganizationScheme::Date);
        let items = vec![
            item(
                "The Daily Show 2008-01-07 [PDTV]",
                "Show Name: The Daily Show; Episode Date: 2008-01-07",
            ),
            item("The Daily Show 2008-1-8", "Episode Date: 2008-1-8"),
            item("The Daily Show", "Show Name: The Daily Show"),
            item("The Daily Show", "Episode Date: 2008-13-45"),
        ];

        let episodes = parser().parse(&show, OrganizationScheme::Date, &items);

        assert_eq!(episodes.len(), 2);
        assert_eq!(
            episodes[0].kind(),
            &EpisodeKind::Dated {
                date: NaiveDate::from_ymd_opt(2008, 1, 7).unwrap()
            }
        );
        assert_eq!(
            episodes[1].kind(),
            &EpisodeKind::Dated {
                date: NaiveDate::from_ymd_opt(2008, 1, 8).unwrap()
            }
        );
    }

    #[test]
    fn test_timed_items_are_always_kept() {
        let show = Show::new("Discovery", "Discovery Channel", OrganizationScheme::Time);
        let items = vec![
            item(
                "Discovery Planet Earth [HR]",
                "Show Name: Discovery; Show Title: Planet Earth; Episode Date: 2008-01-07",
            ),
            item("Discovery something", "no markers at all"),
        ];

        let episodes = parser().parse(&show, OrganizationScheme::Time, &items);

        assert_eq!(episodes.len(), 2);
        assert_eq!(
            episodes[0].kind(),
            &EpisodeKind::Timed {
                title: "Planet Earth".to_string()
            }
        );
        assert_eq!(episodes[0].quality(), 1);
        assert_eq!(
            episodes[1].kind(),
            &EpisodeKind::Timed {
                title: String::new()
            }
        );
    }

    #[test]
    fn test_html_description() {
        let show = Show::new("Lost", "Lost", OrganizationScheme::SeasonEpisode);
        let items = vec![item(
            "Lost 3x07",
            "<p>Show Name: Lost; Season: 3; Episode: 7</p>",
        )];

        let episodes = parser().parse(&show, OrganizationScheme::SeasonEpisode, &items);

        assert_eq!(episodes.len(), 1);
        assert_eq!(
            episodes[0].kind(),
            &EpisodeKind::SeasonEpisode {
                season: 3,
                episode: 7
            }
        );
    }
}
