// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-episode upload: download, upload, wait for indexing, tag, assign.
//!
//! Steps 1, 3, 4 and 5 are fatal to the episode and surface as a
//! [`PipelineError`]. Artwork (2, 6) and playlist assignment (7) are
//! best-effort and only logged. Scratch files are owned by [`ScratchFile`]
//! guards, so they are removed on every exit path.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, instrument, warn};

use super::download::{ARTWORK_TIMEOUT, ASSET_TIMEOUT, download_to_file};
use super::filename::{artwork_extension, audio_extension, remote_path, scratch_stem};
use crate::error::PipelineError;
use crate::feed::{EpisodeRecord, ShowMetadata};
use crate::http::HttpClient;
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::remote::{FileUpdate, MediaApi};

/// Longest comment written to a remote file, in characters
pub const MAX_COMMENT_LENGTH: usize = 500;

/// Poll schedule for the platform's post-upload indexing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexingBackoff {
    pub base: Duration,
    pub step: Duration,
    pub cap: Duration,
    pub max_attempts: u32,
}

impl Default for IndexingBackoff {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(30),
            step: Duration::from_secs(30),
            cap: Duration::from_secs(300),
            max_attempts: 10,
        }
    }
}

impl IndexingBackoff {
    /// Delay before poll number `attempt` (0-based): `min(base + step * attempt, cap)`
    pub fn delay(&self, attempt: u32) -> Duration {
        (self.base + self.step * attempt).min(self.cap)
    }

    /// Every delay of a full, unsuccessful wait
    pub fn schedule(&self) -> Vec<Duration> {
        (0..self.max_attempts).map(|a| self.delay(a)).collect()
    }
}

/// Knobs of the upload pipeline
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub scratch_dir: PathBuf,
    pub backoff: IndexingBackoff,
    pub asset_timeout: Duration,
    /// Also assigned on upload so fresh files are not orphans on the next run
    pub default_playlist: Option<String>,
}

impl PipelineOptions {
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            backoff: IndexingBackoff::default(),
            asset_timeout: ASSET_TIMEOUT,
            default_playlist: None,
        }
    }
}

/// What happened to an episode that made it onto the station
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub file_id: String,
    pub remote_path: String,
    pub artwork_applied: bool,
    pub playlist_assigned: bool,
}

/// A scratch file removed when the guard goes out of scope
struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed scratch file"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove scratch file"),
        }
    }
}

/// Plain-text comment from an HTML-ish description, capped at [`MAX_COMMENT_LENGTH`].
///
/// Tags are stripped from the raw text before entities are decoded, so an
/// escaped `&lt;` survives as a literal `<`.
pub fn episode_comment(description: &str) -> String {
    let stripped = strip_tags(description);
    let decoded = html_escape::decode_html_entities(&stripped);

    let collapsed = decoded.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(MAX_COMMENT_LENGTH).collect()
}

/// Drop `<...>` markup; a `<` not followed by a tag name, `/` or `!` is text
fn strip_tags(raw: &str) -> String {
    let mut text = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    let mut in_tag = false;

    while let Some(c) = chars.next() {
        if in_tag {
            if c == '>' {
                in_tag = false;
                text.push(' ');
            }
            continue;
        }
        let opens_tag = c == '<'
            && chars
                .peek()
                .is_some_and(|next| next.is_ascii_alphabetic() || matches!(next, '/' | '!'));
        if opens_tag {
            in_tag = true;
        } else {
            text.push(c);
        }
    }
    text
}

/// Runs one episode at a time through download, upload and tagging
pub struct UploadPipeline<'a, H: ?Sized, A: ?Sized> {
    http: &'a H,
    api: &'a A,
    options: &'a PipelineOptions,
    reporter: SharedProgressReporter,
}

impl<'a, H, A> UploadPipeline<'a, H, A>
where
    H: HttpClient + ?Sized,
    A: MediaApi + ?Sized,
{
    pub fn new(
        http: &'a H,
        api: &'a A,
        options: &'a PipelineOptions,
        reporter: SharedProgressReporter,
    ) -> Self {
        Self {
            http,
            api,
            options,
            reporter,
        }
    }

    #[instrument(skip_all, fields(episode = %episode.title, show = %show.title))]
    pub async fn process(
        &self,
        episode: &EpisodeRecord,
        show: &ShowMetadata,
        playlist_id: &str,
    ) -> Result<UploadOutcome, PipelineError> {
        let stem = scratch_stem(episode);

        // 1. asset
        let asset = ScratchFile::new(
            self.options
                .scratch_dir
                .join(format!("{stem}.{}", audio_extension(episode))),
        );
        let bytes = download_to_file(
            self.http,
            &episode.asset_url,
            asset.path(),
            self.options.asset_timeout,
            Some(&self.reporter),
        )
        .await?;
        debug!(bytes, "asset downloaded");

        // 2. artwork
        let artwork = self.download_artwork(episode, show, &stem).await;

        // 3. upload
        let path = remote_path(episode, show);
        let contents = read_scratch(asset.path()).await?;
        let file_id = self
            .api
            .upload_file(&path, contents)
            .await
            .map_err(PipelineError::Upload)?
            .ok_or_else(|| PipelineError::MissingRemoteId { path: path.clone() })?;
        info!(file_id = %file_id, path = %path, "asset uploaded");

        // 4. indexing
        self.wait_for_indexing(&file_id, &episode.title).await?;

        // 5. metadata
        let update = FileUpdate {
            title: Some(episode.title.clone()),
            artist: Some(show.author.clone()),
            album: Some(show.title.clone()),
            comment: Some(episode_comment(&episode.description)),
            playlists: None,
        };
        self.api
            .update_file(&file_id, &update)
            .await
            .map_err(|e| PipelineError::Metadata {
                file_id: file_id.clone(),
                source: e,
            })?;

        // 6. artwork
        let artwork_applied = match &artwork {
            Some(scratch) => self.apply_artwork(&file_id, scratch).await,
            None => false,
        };

        // 7. playlist
        let playlist_assigned = self.assign_playlists(&file_id, playlist_id).await;

        Ok(UploadOutcome {
            file_id,
            remote_path: path,
            artwork_applied,
            playlist_assigned,
        })
    }

    async fn download_artwork(
        &self,
        episode: &EpisodeRecord,
        show: &ShowMetadata,
        stem: &str,
    ) -> Option<ScratchFile> {
        let url = episode
            .artwork_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .or_else(|| Some(show.artwork_url.as_str()).filter(|url| !url.is_empty()))?;

        let scratch = ScratchFile::new(
            self.options
                .scratch_dir
                .join(format!("{stem}-art.{}", artwork_extension(url))),
        );

        match download_to_file(self.http, url, scratch.path(), ARTWORK_TIMEOUT, None).await {
            Ok(_) => Some(scratch),
            Err(e) => {
                warn!(url, error = %e, "artwork download failed, continuing without artwork");
                None
            }
        }
    }

    async fn wait_for_indexing(&self, file_id: &str, title: &str) -> Result<(), PipelineError> {
        let backoff = &self.options.backoff;

        for attempt in 0..backoff.max_attempts {
            let delay = backoff.delay(attempt);
            self.reporter.report(ProgressEvent::WaitingForIndexing {
                episode_title: title.to_string(),
                attempt: attempt + 1,
                max_attempts: backoff.max_attempts,
                delay,
            });
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match self.api.get_file(file_id).await {
                Ok(Some(_)) => {
                    debug!(file_id, attempt, "file indexed");
                    return Ok(());
                }
                Ok(None) => debug!(file_id, attempt, "file not indexed yet"),
                Err(e) => debug!(file_id, attempt, error = %e, "indexing poll failed"),
            }
        }

        Err(PipelineError::IndexingTimeout {
            file_id: file_id.to_string(),
            attempts: backoff.max_attempts,
        })
    }

    async fn apply_artwork(&self, file_id: &str, scratch: &ScratchFile) -> bool {
        let contents = match read_scratch(scratch.path()).await {
            Ok(contents) => contents,
            Err(e) => {
                warn!(file_id, error = %e, "could not read artwork scratch file");
                return false;
            }
        };
        let filename = scratch
            .path()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "cover.jpg".to_string());

        match self.api.upload_artwork(file_id, &filename, contents).await {
            Ok(()) => true,
            Err(e) => {
                warn!(file_id, error = %e, "failed to apply artwork");
                false
            }
        }
    }

    async fn assign_playlists(&self, file_id: &str, playlist_id: &str) -> bool {
        let mut playlists = vec![playlist_id.to_string()];
        if let Some(default) = &self.options.default_playlist
            && default != playlist_id
        {
            playlists.push(default.clone());
        }

        match self
            .api
            .update_file(file_id, &FileUpdate::playlists(playlists))
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(file_id, playlist_id, error = %e, "playlist assignment failed, file left unassigned");
                false
            }
        }
    }
}

async fn read_scratch(path: &Path) -> Result<Bytes, PipelineError> {
    tokio::fs::read(path)
        .await
        .map(Bytes::from)
        .map_err(|e| PipelineError::ScratchRead {
            path: path.to_path_buf(),
            source: e,
        })
}
