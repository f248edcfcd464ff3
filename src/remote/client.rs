// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use super::{
    FileUpdate, IdValue, MediaApi, OrderEntry, Playlist, RemoteFile, WireFile, WirePlaylist,
};
use crate::error::ApiError;

/// Timeout applied to every call against the station API
pub const API_TIMEOUT: Duration = Duration::from_secs(60);

const API_KEY_HEADER: &str = "X-API-Key";

/// reqwest-backed client for a station's media API
#[derive(Clone)]
pub struct StationClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl StationClient {
    /// `host` is the platform root (e.g. `https://radio.example.com`)
    pub fn new(host: &str, station: &str, api_key: &str) -> Self {
        Self::with_client(Client::new(), host, station, api_key)
    }

    pub fn with_client(client: Client, host: &str, station: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: format!(
                "{}/api/station/{}",
                host.trim_end_matches('/'),
                station.trim_matches('/')
            ),
            api_key: api_key.to_string(),
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header(API_KEY_HEADER, &self.api_key)
            .timeout(API_TIMEOUT)
    }

    /// Send and return the body of a successful response
    async fn send(&self, endpoint: &str, builder: RequestBuilder) -> Result<String, ApiError> {
        let response = self
            .request(builder)
            .send()
            .await
            .map_err(|e| ApiError::Request {
                endpoint: endpoint.to_string(),
                source: e,
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| ApiError::Request {
            endpoint: endpoint.to_string(),
            source: e,
        })?;

        if !status.is_success() {
            return Err(ApiError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        Ok(body)
    }

    fn decode<T: DeserializeOwned>(endpoint: &str, body: &str) -> Result<T, ApiError> {
        serde_json::from_str(body).map_err(|e| ApiError::Decode {
            endpoint: endpoint.to_string(),
            source: e,
        })
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() <= MAX {
        body.to_string()
    } else {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    }
}

/// Pull an id out of whatever an upload call answered with
fn extract_upload_id(value: Value) -> Option<String> {
    match value {
        Value::Object(mut map) => map
            .remove("id")
            .or_else(|| map.remove("media_id"))
            .and_then(|id| serde_json::from_value::<IdValue>(id).ok())
            .and_then(IdValue::into_id),
        other => serde_json::from_value::<IdValue>(other)
            .ok()
            .and_then(IdValue::into_id),
    }
}

fn image_mime(filename: &str) -> &'static str {
    let lower = filename.to_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else {
        "image/jpeg"
    }
}

#[async_trait]
impl MediaApi for StationClient {
    #[instrument(skip(self))]
    async fn list_files(&self) -> Result<Vec<RemoteFile>, ApiError> {
        let endpoint = "/files";
        let body = self
            .send(endpoint, self.client.get(self.url(endpoint)))
            .await?;
        let wire: Vec<WireFile> = Self::decode(endpoint, &body)?;
        let total = wire.len();

        let files: Vec<RemoteFile> = wire
            .into_iter()
            .filter_map(WireFile::into_remote_file)
            .collect();
        if files.len() < total {
            warn!(
                dropped = total - files.len(),
                "ignoring listed files without an id"
            );
        }
        debug!(count = files.len(), "listed remote files");
        Ok(files)
    }

    #[instrument(skip(self))]
    async fn get_file(&self, file_id: &str) -> Result<Option<RemoteFile>, ApiError> {
        let endpoint = format!("/file/{file_id}");
        match self
            .send(&endpoint, self.client.get(self.url(&endpoint)))
            .await
        {
            Ok(body) => {
                let wire: WireFile = Self::decode(&endpoint, &body)?;
                Ok(wire.into_remote_file())
            }
            Err(ApiError::Status { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, contents), fields(bytes = contents.len()))]
    async fn upload_file(&self, path: &str, contents: Bytes) -> Result<Option<String>, ApiError> {
        let endpoint = "/files";
        let payload = json!({
            "path": path,
            "file": STANDARD.encode(&contents),
        });
        let body = self
            .send(endpoint, self.client.post(self.url(endpoint)).json(&payload))
            .await?;

        if body.trim().is_empty() {
            return Ok(None);
        }
        let value: Value = Self::decode(endpoint, &body)?;
        Ok(extract_upload_id(value))
    }

    #[instrument(skip(self, update))]
    async fn update_file(&self, file_id: &str, update: &FileUpdate) -> Result<(), ApiError> {
        let endpoint = format!("/file/{file_id}");
        self.send(&endpoint, self.client.put(self.url(&endpoint)).json(update))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_file(&self, file_id: &str) -> Result<(), ApiError> {
        let endpoint = format!("/file/{file_id}");
        self.send(&endpoint, self.client.delete(self.url(&endpoint)))
            .await?;
        Ok(())
    }

    #[instrument(skip(self, contents), fields(bytes = contents.len()))]
    async fn upload_artwork(
        &self,
        file_id: &str,
        filename: &str,
        contents: Bytes,
    ) -> Result<(), ApiError> {
        let endpoint = format!("/file/{file_id}/art");
        let part = reqwest::multipart::Part::bytes(contents.to_vec())
            .file_name(filename.to_string())
            .mime_str(image_mime(filename))
            .map_err(|e| ApiError::Multipart(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("art", part);

        self.send(
            &endpoint,
            self.client.post(self.url(&endpoint)).multipart(form),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_playlists(&self) -> Result<Vec<Playlist>, ApiError> {
        let endpoint = "/playlists";
        let body = self
            .send(endpoint, self.client.get(self.url(endpoint)))
            .await?;
        let wire: Vec<WirePlaylist> = Self::decode(endpoint, &body)?;
        Ok(wire
            .into_iter()
            .filter_map(WirePlaylist::into_playlist)
            .collect())
    }

    #[instrument(skip(self))]
    async fn playlist_order(&self, playlist_id: &str) -> Result<Vec<String>, ApiError> {
        let endpoint = format!("/playlist/{playlist_id}/order");
        let body = self
            .send(&endpoint, self.client.get(self.url(&endpoint)))
            .await?;
        let entries: Vec<OrderEntry> = Self::decode(&endpoint, &body)?;
        Ok(entries.into_iter().filter_map(OrderEntry::into_id).collect())
    }
}
