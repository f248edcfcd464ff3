// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory fakes shared by the unit tests.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::error::ApiError;
use crate::feed::{EpisodeRecord, ShowMetadata};
use crate::http::{ByteStream, HttpClient, HttpResponse};
use crate::remote::{FileUpdate, MediaApi, Playlist, RemoteFile};

#[derive(Clone)]
enum FakeResponse {
    Body(Vec<u8>),
    Redirect(String),
    Status(u16),
}

/// Canned HTTP responses keyed by URL; unknown URLs answer 404
#[derive(Default)]
pub struct FakeHttp {
    responses: HashMap<String, FakeResponse>,
    requested: Mutex<Vec<String>>,
}

impl FakeHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, url: &str, body: &[u8]) -> Self {
        self.responses
            .insert(url.to_string(), FakeResponse::Body(body.to_vec()));
        self
    }

    pub fn with_redirect(mut self, url: &str, location: &str) -> Self {
        self.responses
            .insert(url.to_string(), FakeResponse::Redirect(location.to_string()));
        self
    }

    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.responses
            .insert(url.to_string(), FakeResponse::Status(status));
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

fn body_stream(data: Vec<u8>) -> ByteStream {
    Box::pin(futures::stream::once(async move { Ok(Bytes::from(data)) }))
}

#[async_trait]
impl HttpClient for FakeHttp {
    async fn get_stream(&self, url: &str) -> Result<HttpResponse, reqwest::Error> {
        self.requested.lock().unwrap().push(url.to_string());

        let response = match self.responses.get(url).cloned() {
            Some(FakeResponse::Body(data)) => HttpResponse {
                status: 200,
                location: None,
                content_length: Some(data.len() as u64),
                body: body_stream(data),
            },
            Some(FakeResponse::Redirect(location)) => HttpResponse {
                status: 302,
                location: Some(location),
                content_length: Some(0),
                body: body_stream(Vec::new()),
            },
            Some(FakeResponse::Status(status)) => HttpResponse {
                status,
                location: None,
                content_length: Some(0),
                body: body_stream(Vec::new()),
            },
            None => HttpResponse {
                status: 404,
                location: None,
                content_length: Some(0),
                body: body_stream(Vec::new()),
            },
        };
        Ok(response)
    }
}

/// Mutable state of [`FakeMediaApi`]; tests poke at it directly
#[derive(Default)]
pub struct FakeState {
    pub files: Vec<RemoteFile>,
    pub playlists: Vec<Playlist>,
    next_id: u64,
    /// Files only become visible to `get_file` after this many polls
    pub index_after_polls: u32,
    polls: HashMap<String, u32>,
    pub never_index: bool,
    pub fail_upload: bool,
    pub upload_returns_no_id: bool,
    pub fail_metadata: bool,
    pub fail_artwork: bool,
    pub fail_assign: bool,
    pub fail_list: bool,
    pub fail_delete: HashSet<String>,
    pub fail_unassign: HashSet<String>,

    pub uploaded_paths: Vec<String>,
    pub deleted: Vec<String>,
    pub updates: Vec<(String, FileUpdate)>,
    pub artwork: Vec<(String, String)>,
    pub list_calls: usize,
}

#[derive(Default)]
pub struct FakeMediaApi {
    state: Mutex<FakeState>,
}

impl FakeMediaApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_files(files: Vec<RemoteFile>) -> Self {
        let api = Self::default();
        api.state().files = files;
        api
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    fn failure(endpoint: &str) -> ApiError {
        ApiError::Status {
            endpoint: endpoint.to_string(),
            status: 500,
            body: "injected failure".to_string(),
        }
    }
}

#[async_trait]
impl MediaApi for FakeMediaApi {
    async fn list_files(&self) -> Result<Vec<RemoteFile>, ApiError> {
        let mut state = self.state();
        state.list_calls += 1;
        if state.fail_list {
            return Err(Self::failure("/files"));
        }
        Ok(state.files.clone())
    }

    async fn get_file(&self, file_id: &str) -> Result<Option<RemoteFile>, ApiError> {
        let mut state = self.state();
        let polls = {
            let count = state.polls.entry(file_id.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        if state.never_index || polls <= state.index_after_polls {
            return Ok(None);
        }
        Ok(state.files.iter().find(|f| f.id == file_id).cloned())
    }

    async fn upload_file(&self, path: &str, _contents: Bytes) -> Result<Option<String>, ApiError> {
        let mut state = self.state();
        if state.fail_upload {
            return Err(Self::failure("/files"));
        }
        state.uploaded_paths.push(path.to_string());
        if state.upload_returns_no_id {
            return Ok(None);
        }
        state.next_id += 1;
        let id = format!("up-{}", state.next_id);
        state.files.push(RemoteFile {
            id: id.clone(),
            title: path.to_string(),
            artist: String::new(),
            album: String::new(),
            uploaded_at: Some(Utc::now()),
            playlists: BTreeSet::new(),
        });
        Ok(Some(id))
    }

    async fn update_file(&self, file_id: &str, update: &FileUpdate) -> Result<(), ApiError> {
        let mut state = self.state();
        let is_metadata = update.title.is_some();
        let clears = update.playlists.as_ref().is_some_and(|p| p.is_empty());
        let assigns = update.playlists.as_ref().is_some_and(|p| !p.is_empty());

        if (is_metadata && state.fail_metadata)
            || (assigns && state.fail_assign)
            || (clears && state.fail_unassign.contains(file_id))
        {
            return Err(Self::failure("/file"));
        }

        state.updates.push((file_id.to_string(), update.clone()));
        if let Some(file) = state.files.iter_mut().find(|f| f.id == file_id) {
            if let Some(title) = &update.title {
                file.title = title.clone();
            }
            if let Some(artist) = &update.artist {
                file.artist = artist.clone();
            }
            if let Some(album) = &update.album {
                file.album = album.clone();
            }
            if let Some(playlists) = &update.playlists {
                file.playlists = playlists.iter().cloned().collect();
            }
        }
        Ok(())
    }

    async fn delete_file(&self, file_id: &str) -> Result<(), ApiError> {
        let mut state = self.state();
        if state.fail_delete.contains(file_id) {
            return Err(Self::failure("/file"));
        }
        state.files.retain(|f| f.id != file_id);
        state.deleted.push(file_id.to_string());
        Ok(())
    }

    async fn upload_artwork(
        &self,
        file_id: &str,
        filename: &str,
        _contents: Bytes,
    ) -> Result<(), ApiError> {
        let mut state = self.state();
        if state.fail_artwork {
            return Err(Self::failure("/art"));
        }
        state
            .artwork
            .push((file_id.to_string(), filename.to_string()));
        Ok(())
    }

    async fn list_playlists(&self) -> Result<Vec<Playlist>, ApiError> {
        Ok(self.state().playlists.clone())
    }

    async fn playlist_order(&self, playlist_id: &str) -> Result<Vec<String>, ApiError> {
        Ok(self
            .state()
            .files
            .iter()
            .filter(|f| f.in_playlist(playlist_id))
            .map(|f| f.id.clone())
            .collect())
    }
}

pub fn remote_file(
    id: &str,
    title: &str,
    artist: &str,
    album: &str,
    uploaded_at: Option<DateTime<Utc>>,
    playlists: &[&str],
) -> RemoteFile {
    RemoteFile {
        id: id.to_string(),
        title: title.to_string(),
        artist: artist.to_string(),
        album: album.to_string(),
        uploaded_at,
        playlists: playlists.iter().map(|p| p.to_string()).collect(),
    }
}

pub fn show(title: &str, author: &str) -> ShowMetadata {
    ShowMetadata {
        title: title.to_string(),
        description: String::new(),
        author: author.to_string(),
        artwork_url: String::new(),
    }
}

pub fn episode(id: &str, title: &str, published: Option<DateTime<Utc>>) -> EpisodeRecord {
    EpisodeRecord {
        title: title.to_string(),
        description: String::new(),
        published,
        asset_url: format!("https://cdn.example.com/{id}.mp3"),
        asset_mime_type: Some("audio/mpeg".to_string()),
        id: id.to_string(),
        duration: None,
        artwork_url: None,
    }
}
