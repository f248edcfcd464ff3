mod fetch;
mod parse;

pub use fetch::{FEED_TIMEOUT, fetch_feed, fetch_feed_text};
pub use parse::{EpisodeRecord, ParsedFeed, ShowMetadata, derive_episode_id, parse_feed};
