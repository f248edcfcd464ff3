// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, FixedOffset, Utc};
use sha2::{Digest, Sha256};

use crate::error::FeedError;

/// Hex characters kept from the SHA-256 digest of a derived identifier
const DERIVED_ID_LENGTH: usize = 32;

/// Show-level metadata taken from the channel element. Missing values are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShowMetadata {
    pub title: String,
    pub description: String,
    pub author: String,
    pub artwork_url: String,
}

/// A single episode taken from an item element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeRecord {
    pub title: String,
    pub description: String,
    pub published: Option<DateTime<Utc>>,
    pub asset_url: String,
    pub asset_mime_type: Option<String>,
    /// Stable key used for cross-run deduplication
    pub id: String,
    pub duration: Option<String>,
    pub artwork_url: Option<String>,
}

/// Result of parsing a feed document
#[derive(Debug, Clone)]
pub struct ParsedFeed {
    pub show: ShowMetadata,
    /// Episodes in document order
    pub episodes: Vec<EpisodeRecord>,
}

/// Parse RSS feed text into show metadata and episode records.
///
/// Missing elements degrade to empty values; only a document that is not
/// RSS at all is rejected. Items without an enclosure are dropped.
pub fn parse_feed(text: &str) -> Result<ParsedFeed, FeedError> {
    let channel = rss::Channel::read_from(text.as_bytes())?;

    let artwork_url = channel
        .image()
        .map(|img| img.url().trim().to_string())
        .filter(|url| !url.is_empty())
        .or_else(|| {
            channel
                .itunes_ext()
                .and_then(|ext| ext.image())
                .map(|url| url.trim().to_string())
        })
        .unwrap_or_default();

    let author = channel
        .itunes_ext()
        .and_then(|ext| ext.author())
        .or_else(|| channel.managing_editor())
        .map(|s| s.trim().to_string())
        .unwrap_or_default();

    let show = ShowMetadata {
        title: channel.title().trim().to_string(),
        description: channel.description().trim().to_string(),
        author,
        artwork_url,
    };

    let episodes = channel.items().iter().filter_map(parse_episode).collect();

    Ok(ParsedFeed { show, episodes })
}

fn parse_episode(item: &rss::Item) -> Option<EpisodeRecord> {
    let enclosure = item.enclosure()?;
    let asset_url = enclosure.url().trim();
    if asset_url.is_empty() {
        return None;
    }

    let title = item.title().map(str::trim).unwrap_or_default().to_string();

    let published = item.pub_date().and_then(|date_str| {
        DateTime::parse_from_rfc2822(date_str.trim())
            .or_else(|_| parse_relaxed_date(date_str.trim()))
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    });

    let id = item
        .guid()
        .map(|g| g.value().trim())
        .filter(|value| !value.is_empty())
        .map(String::from)
        .unwrap_or_else(|| derive_episode_id(&title, asset_url));

    let itunes = item.itunes_ext();

    Some(EpisodeRecord {
        description: item
            .description()
            .or_else(|| itunes.and_then(|ext| ext.summary()))
            .map(str::trim)
            .unwrap_or_default()
            .to_string(),
        published,
        asset_url: asset_url.to_string(),
        asset_mime_type: Some(enclosure.mime_type().trim().to_string()).filter(|s| !s.is_empty()),
        id,
        duration: itunes.and_then(|ext| ext.duration().map(String::from)),
        artwork_url: itunes
            .and_then(|ext| ext.image())
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty()),
        title,
    })
}

/// Derive a stable identifier from an episode's title and asset URL
pub fn derive_episode_id(title: &str, asset_url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(b"|");
    hasher.update(asset_url.as_bytes());
    let digest = hasher.finalize();

    let mut hex: String = digest.iter().map(|byte| format!("{byte:02x}")).collect();
    hex.truncate(DERIVED_ID_LENGTH);
    hex
}

/// Try to parse dates that don't strictly conform to RFC 2822
fn parse_relaxed_date(date_str: &str) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
    let formats = [
        "%a, %d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M:%S %z",
        "%Y-%m-%dT%H:%M:%S%:z",
        "%Y-%m-%d %H:%M:%S %z",
    ];

    let mut last_error = None;
    for format in formats {
        match DateTime::parse_from_str(date_str, format) {
            Ok(dt) => return Ok(dt),
            Err(e) => last_error = Some(e),
        }
    }

    match last_error {
        Some(e) => Err(e),
        None => DateTime::parse_from_rfc3339(date_str),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd">
  <channel>
    <title>Test Podcast</title>
    <description>A test podcast for unit testing</description>
    <link>https://example.com</link>
    <itunes:author>Test Author</itunes:author>
    <itunes:image href="https://example.com/image.jpg"/>
    <item>
      <title>Episode 1</title>
      <description>First episode</description>
      <pubDate>Mon, 01 Jan 2024 12:00:00 +0000</pubDate>
      <guid>ep1-guid</guid>
      <enclosure url="https://example.com/ep1.mp3" length="1234567" type="audio/mpeg"/>
      <itunes:duration>30:00</itunes:duration>
      <itunes:image href="https://example.com/ep1.jpg"/>
    </item>
    <item>
      <title>Episode 2</title>
      <enclosure url="https://example.com/ep2.mp3" type="audio/mpeg"/>
    </item>
    <item>
      <title>No Audio</title>
      <guid>no-audio</guid>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parse_feed_extracts_show_metadata() {
        let feed = parse_feed(SAMPLE_FEED).unwrap();

        assert_eq!(feed.show.title, "Test Podcast");
        assert_eq!(feed.show.description, "A test podcast for unit testing");
        assert_eq!(feed.show.author, "Test Author");
        assert_eq!(feed.show.artwork_url, "https://example.com/image.jpg");
    }

    #[test]
    fn parse_feed_extracts_episodes_in_document_order() {
        let feed = parse_feed(SAMPLE_FEED).unwrap();

        assert_eq!(feed.episodes.len(), 2);

        let ep1 = &feed.episodes[0];
        assert_eq!(ep1.title, "Episode 1");
        assert_eq!(ep1.id, "ep1-guid");
        assert_eq!(ep1.description, "First episode");
        assert_eq!(ep1.duration.as_deref(), Some("30:00"));
        assert_eq!(ep1.artwork_url.as_deref(), Some("https://example.com/ep1.jpg"));
        assert_eq!(ep1.asset_mime_type.as_deref(), Some("audio/mpeg"));
        assert_eq!(
            ep1.published.map(|dt| dt.to_rfc3339()),
            Some("2024-01-01T12:00:00+00:00".to_string())
        );

        assert_eq!(feed.episodes[1].title, "Episode 2");
    }

    #[test]
    fn parse_feed_handles_missing_optional_fields() {
        let feed = parse_feed(SAMPLE_FEED).unwrap();

        let ep2 = &feed.episodes[1];
        assert!(ep2.published.is_none());
        assert!(ep2.duration.is_none());
        assert!(ep2.artwork_url.is_none());
        assert_eq!(ep2.description, "");
        assert_eq!(ep2.id, derive_episode_id("Episode 2", "https://example.com/ep2.mp3"));
    }

    #[test]
    fn parse_feed_degrades_missing_channel_tags_to_empty() {
        let sparse = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <item>
      <enclosure url="https://example.com/a.mp3" type="audio/mpeg"/>
    </item>
  </channel>
</rss>"#;

        let feed = parse_feed(sparse).unwrap();
        assert_eq!(feed.show, ShowMetadata::default());
        assert_eq!(feed.episodes.len(), 1);
        assert_eq!(feed.episodes[0].title, "");
    }

    #[test]
    fn parse_feed_falls_back_to_managing_editor_for_author() {
        let feed_text = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Show</title>
    <managingEditor>editor@example.com (Jane Editor)</managingEditor>
  </channel>
</rss>"#;

        let feed = parse_feed(feed_text).unwrap();
        assert_eq!(feed.show.author, "editor@example.com (Jane Editor)");
        assert!(feed.episodes.is_empty());
    }

    #[test]
    fn parse_feed_rejects_non_rss_text() {
        assert!(parse_feed("this is not xml at all").is_err());
    }

    #[test]
    fn derived_identifier_is_stable_across_parses() {
        let feed_text = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Show</title>
    <item>
      <title>Same Title</title>
      <enclosure url="https://example.com/same.mp3" type="audio/mpeg"/>
    </item>
  </channel>
</rss>"#;

        let first = parse_feed(feed_text).unwrap();
        let second = parse_feed(feed_text).unwrap();

        assert_eq!(first.episodes[0].id, second.episodes[0].id);
        assert_eq!(first.episodes[0].id.len(), DERIVED_ID_LENGTH);
    }

    #[test]
    fn derived_identifier_depends_on_title_and_url() {
        let base = derive_episode_id("Title", "https://example.com/a.mp3");
        assert_ne!(base, derive_episode_id("Other", "https://example.com/a.mp3"));
        assert_ne!(base, derive_episode_id("Title", "https://example.com/b.mp3"));
    }

    #[test]
    fn relaxed_date_accepts_rfc3339() {
        let dt = parse_relaxed_date("2024-03-05T10:00:00+01:00").unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-03-05T10:00:00+01:00");
    }
}
