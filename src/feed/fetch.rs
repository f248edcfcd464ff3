// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::Duration;

use url::Url;

use crate::error::FeedError;
use crate::http::{HttpClient, get_following_redirects};

use super::parse::{ParsedFeed, parse_feed};

/// Overall deadline for one feed retrieval, redirects included
pub const FEED_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetch raw feed text from a URL, following redirects
pub async fn fetch_feed_text<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
) -> Result<String, FeedError> {
    let feed_url = Url::parse(url)?;
    match tokio::time::timeout(FEED_TIMEOUT, fetch_text(client, &feed_url)).await {
        Ok(result) => result,
        Err(_) => Err(FeedError::Timeout {
            url: url.to_string(),
        }),
    }
}

async fn fetch_text<C: HttpClient + ?Sized>(client: &C, url: &Url) -> Result<String, FeedError> {
    let (final_url, response) = get_following_redirects(client, url).await?;

    if !response.is_success() {
        return Err(FeedError::HttpStatus {
            url: final_url.to_string(),
            status: response.status,
        });
    }

    let bytes = response
        .collect()
        .await
        .map_err(|e| FeedError::FetchFailed {
            url: final_url.to_string(),
            source: e,
        })?;

    String::from_utf8(bytes.to_vec()).map_err(|e| FeedError::InvalidBody {
        url: final_url.to_string(),
        reason: e.to_string(),
    })
}

/// Fetch and parse a podcast feed from a URL
pub async fn fetch_feed<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
) -> Result<ParsedFeed, FeedError> {
    let text = fetch_feed_text(client, url).await?;
    parse_feed(&text)
}
