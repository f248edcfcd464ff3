// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::error::DownloadError;
use crate::http::{HttpClient, get_following_redirects};
use crate::progress::{ProgressEvent, SharedProgressReporter};

/// Deadline for pulling one episode asset
pub const ASSET_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Deadline for pulling artwork
pub const ARTWORK_TIMEOUT: Duration = Duration::from_secs(60);

/// Download `url` to `output_path`, streaming the body to disk.
///
/// Fails on a non-success status, on `timeout`, or when the body is empty.
/// Returns the number of bytes written. Progress is reported when a
/// reporter is given.
pub async fn download_to_file<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
    output_path: &Path,
    timeout: Duration,
    reporter: Option<&SharedProgressReporter>,
) -> Result<u64, DownloadError> {
    match tokio::time::timeout(timeout, stream_to_file(client, url, output_path, reporter)).await {
        Ok(result) => result,
        Err(_) => Err(DownloadError::Timeout {
            url: url.to_string(),
        }),
    }
}

async fn stream_to_file<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
    output_path: &Path,
    reporter: Option<&SharedProgressReporter>,
) -> Result<u64, DownloadError> {
    let parsed = Url::parse(url).map_err(|e| DownloadError::InvalidUrl {
        url: url.to_string(),
        source: e,
    })?;

    let (_, response) = get_following_redirects(client, &parsed).await?;

    if !response.is_success() {
        return Err(DownloadError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    let mut file = File::create(output_path)
        .await
        .map_err(|e| DownloadError::FileCreateFailed {
            path: output_path.to_path_buf(),
            source: e,
        })?;

    let total_bytes = response.content_length;
    let mut bytes_downloaded: u64 = 0;
    let mut stream = response.body;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::StreamFailed {
            url: url.to_string(),
            source: e,
        })?;

        file.write_all(&chunk)
            .await
            .map_err(|e| DownloadError::FileWriteFailed {
                path: output_path.to_path_buf(),
                source: e,
            })?;

        bytes_downloaded += chunk.len() as u64;

        if let Some(reporter) = reporter {
            reporter.report(ProgressEvent::TransferProgress {
                bytes_downloaded,
                total_bytes,
            });
        }
    }

    file.flush()
        .await
        .map_err(|e| DownloadError::FileWriteFailed {
            path: output_path.to_path_buf(),
            source: e,
        })?;

    if bytes_downloaded == 0 {
        return Err(DownloadError::Empty {
            url: url.to_string(),
        });
    }

    Ok(bytes_downloaded)
}
