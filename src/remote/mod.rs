// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Contract of the remote media platform and the wire shapes it returns.
//!
//! The platform is loose about element shapes: identifiers arrive as
//! numbers or numeric strings, and a file's playlist membership may be a
//! list of bare ids or of objects keyed by `id` or `playlist_id`. Every
//! such value is decoded into an explicit variant first ([`IdValue`],
//! [`PlaylistRef`], [`TimestampValue`]) and only then normalized.

mod client;

use std::collections::BTreeSet;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::ApiError;

pub use client::{API_TIMEOUT, StationClient};

/// Point-in-time view of a file held by the remote platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub uploaded_at: Option<DateTime<Utc>>,
    /// Ids of the playlists this file is assigned to
    pub playlists: BTreeSet<String>,
}

impl RemoteFile {
    pub fn in_playlist(&self, playlist_id: &str) -> bool {
        self.playlists.contains(playlist_id)
    }

    pub fn is_assigned(&self) -> bool {
        !self.playlists.is_empty()
    }
}

/// A playlist defined on the station
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    pub id: String,
    pub name: String,
}

/// Fields to change on a remote file. `None` leaves a field untouched;
/// `playlists: Some(vec![])` clears all membership.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_playlist_ids"
    )]
    pub playlists: Option<Vec<String>>,
}

impl FileUpdate {
    pub fn playlists(ids: Vec<String>) -> Self {
        Self {
            playlists: Some(ids),
            ..Default::default()
        }
    }

    pub fn clear_playlists() -> Self {
        Self::playlists(Vec::new())
    }
}

/// Numeric ids go back out as numbers, anything else as strings
fn serialize_playlist_ids<S: Serializer>(
    ids: &Option<Vec<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let values: Vec<serde_json::Value> = ids
        .iter()
        .flatten()
        .map(|id| match id.parse::<u64>() {
            Ok(n) => serde_json::Value::from(n),
            Err(_) => serde_json::Value::from(id.as_str()),
        })
        .collect();
    values.serialize(serializer)
}

/// Operations consumed from the remote media platform
#[async_trait]
pub trait MediaApi: Send + Sync {
    async fn list_files(&self) -> Result<Vec<RemoteFile>, ApiError>;

    /// `Ok(None)` when the file is not (yet) known to the platform
    async fn get_file(&self, file_id: &str) -> Result<Option<RemoteFile>, ApiError>;

    /// Store a binary asset at `path`; returns the new file's id if the platform reported one
    async fn upload_file(&self, path: &str, contents: Bytes) -> Result<Option<String>, ApiError>;

    async fn update_file(&self, file_id: &str, update: &FileUpdate) -> Result<(), ApiError>;

    async fn delete_file(&self, file_id: &str) -> Result<(), ApiError>;

    async fn upload_artwork(
        &self,
        file_id: &str,
        filename: &str,
        contents: Bytes,
    ) -> Result<(), ApiError>;

    async fn list_playlists(&self) -> Result<Vec<Playlist>, ApiError>;

    /// File ids of a playlist in play order.
    ///
    /// Not used by an ingestion run: retention ranks by upload time, never
    /// by play order. Kept so callers can inspect what a show's playlist
    /// will actually play after a run.
    async fn playlist_order(&self, playlist_id: &str) -> Result<Vec<String>, ApiError>;
}

/// An identifier as the platform sends it
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum IdValue {
    Number(u64),
    Text(String),
}

impl IdValue {
    /// Normalized textual id; blank strings are no id at all
    pub fn into_id(self) -> Option<String> {
        match self {
            IdValue::Number(n) => Some(n.to_string()),
            IdValue::Text(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
        }
    }
}

/// One entry of a file's playlist membership
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PlaylistRef {
    Bare(IdValue),
    Keyed {
        #[serde(default)]
        id: Option<IdValue>,
        #[serde(default)]
        playlist_id: Option<IdValue>,
    },
    Unrecognized(serde_json::Value),
}

impl PlaylistRef {
    pub fn into_id(self) -> Option<String> {
        match self {
            PlaylistRef::Bare(id) => id.into_id(),
            PlaylistRef::Keyed { id, playlist_id } => id
                .and_then(IdValue::into_id)
                .or_else(|| playlist_id.and_then(IdValue::into_id)),
            PlaylistRef::Unrecognized(_) => None,
        }
    }
}

/// Upload time as unix seconds (number or string) or an RFC 3339 string
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TimestampValue {
    Unix(i64),
    Fractional(f64),
    Text(String),
}

impl TimestampValue {
    pub fn into_datetime(self) -> Option<DateTime<Utc>> {
        match self {
            TimestampValue::Unix(secs) => DateTime::from_timestamp(secs, 0),
            TimestampValue::Fractional(secs) => DateTime::from_timestamp(secs as i64, 0),
            TimestampValue::Text(text) => {
                let text = text.trim();
                match text.parse::<i64>() {
                    Ok(secs) => DateTime::from_timestamp(secs, 0),
                    Err(_) => DateTime::parse_from_rfc3339(text)
                        .ok()
                        .map(|dt| dt.with_timezone(&Utc)),
                }
            }
        }
    }
}

/// A media file as it appears on the wire
#[derive(Debug, Deserialize)]
pub(crate) struct WireFile {
    #[serde(default)]
    id: Option<IdValue>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    artist: Option<String>,
    #[serde(default)]
    album: Option<String>,
    #[serde(default)]
    uploaded_at: Option<TimestampValue>,
    #[serde(default)]
    playlists: Option<Vec<PlaylistRef>>,
}

impl WireFile {
    /// Normalize into a [`RemoteFile`]; `None` when the element carries no id
    pub(crate) fn into_remote_file(self) -> Option<RemoteFile> {
        let id = self.id.and_then(IdValue::into_id)?;
        Some(RemoteFile {
            id,
            title: self.title.unwrap_or_default(),
            artist: self.artist.unwrap_or_default(),
            album: self.album.unwrap_or_default(),
            uploaded_at: self.uploaded_at.and_then(TimestampValue::into_datetime),
            playlists: self
                .playlists
                .unwrap_or_default()
                .into_iter()
                .filter_map(PlaylistRef::into_id)
                .collect(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WirePlaylist {
    #[serde(default)]
    id: Option<IdValue>,
    #[serde(default)]
    name: Option<String>,
}

impl WirePlaylist {
    pub(crate) fn into_playlist(self) -> Option<Playlist> {
        Some(Playlist {
            id: self.id.and_then(IdValue::into_id)?,
            name: self.name.unwrap_or_default(),
        })
    }
}

/// Entry of a playlist order listing: a bare id, or an object holding the
/// media id directly or under `media`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum OrderEntry {
    Bare(IdValue),
    Keyed {
        #[serde(default)]
        media: Option<OrderMedia>,
        #[serde(default)]
        id: Option<IdValue>,
    },
}

#[derive(Debug, Deserialize)]
pub(crate) struct OrderMedia {
    #[serde(default)]
    id: Option<IdValue>,
}

impl OrderEntry {
    pub(crate) fn into_id(self) -> Option<String> {
        match self {
            OrderEntry::Bare(id) => id.into_id(),
            OrderEntry::Keyed { media, id } => media
                .and_then(|m| m.id)
                .and_then(IdValue::into_id)
                .or_else(|| id.and_then(IdValue::into_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode_file(value: serde_json::Value) -> Option<RemoteFile> {
        serde_json::from_value::<WireFile>(value)
            .unwrap()
            .into_remote_file()
    }

    #[test]
    fn id_value_accepts_numbers_and_numeric_strings() {
        let n: IdValue = serde_json::from_value(json!(42)).unwrap();
        let s: IdValue = serde_json::from_value(json!(" 42 ")).unwrap();
        assert_eq!(n.into_id().as_deref(), Some("42"));
        assert_eq!(s.into_id().as_deref(), Some("42"));
    }

    #[test]
    fn blank_id_is_no_id() {
        let s: IdValue = serde_json::from_value(json!("  ")).unwrap();
        assert_eq!(s.into_id(), None);
    }

    #[test]
    fn playlist_membership_accepts_every_element_shape() {
        let file = decode_file(json!({
            "id": 7,
            "title": "Episode",
            "playlists": [1, "2", {"id": 3, "name": "Default"}, {"playlist_id": "4"}, {"name": "no id"}, null]
        }))
        .unwrap();

        let expected: BTreeSet<String> = ["1", "2", "3", "4"].iter().map(|s| s.to_string()).collect();
        assert_eq!(file.playlists, expected);
    }

    #[test]
    fn keyed_playlist_prefers_id_over_playlist_id() {
        let entry: PlaylistRef = serde_json::from_value(json!({"id": 1, "playlist_id": 2})).unwrap();
        assert_eq!(entry.into_id().as_deref(), Some("1"));
    }

    #[test]
    fn wire_file_tolerates_nulls_and_missing_fields() {
        let file = decode_file(json!({"id": "abc", "artist": null, "playlists": null})).unwrap();

        assert_eq!(file.id, "abc");
        assert_eq!(file.title, "");
        assert_eq!(file.artist, "");
        assert!(file.uploaded_at.is_none());
        assert!(!file.is_assigned());
    }

    #[test]
    fn wire_file_without_id_is_dropped() {
        assert!(decode_file(json!({"title": "orphaned row"})).is_none());
    }

    #[test]
    fn timestamps_decode_from_unix_and_rfc3339() {
        let unix = decode_file(json!({"id": 1, "uploaded_at": 1_700_000_000})).unwrap();
        let text = decode_file(json!({"id": 2, "uploaded_at": "1700000000"})).unwrap();
        let rfc = decode_file(json!({"id": 3, "uploaded_at": "2023-11-14T22:13:20Z"})).unwrap();

        assert_eq!(unix.uploaded_at, DateTime::from_timestamp(1_700_000_000, 0));
        assert_eq!(text.uploaded_at, unix.uploaded_at);
        assert_eq!(rfc.uploaded_at, unix.uploaded_at);
    }

    #[test]
    fn file_update_serializes_only_set_fields() {
        let update = FileUpdate {
            title: Some("Title".to_string()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&update).unwrap(), json!({"title": "Title"}));
    }

    #[test]
    fn file_update_serializes_numeric_playlist_ids_as_numbers() {
        let update = FileUpdate::playlists(vec!["5".to_string(), "night-shift".to_string()]);
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({"playlists": [5, "night-shift"]})
        );
        assert_eq!(
            serde_json::to_value(FileUpdate::clear_playlists()).unwrap(),
            json!({"playlists": []})
        );
    }

    #[test]
    fn order_entries_resolve_media_ids() {
        let entries: Vec<OrderEntry> =
            serde_json::from_value(json!([10, {"media": {"id": "11"}}, {"id": 12}])).unwrap();
        let ids: Vec<String> = entries.into_iter().filter_map(OrderEntry::into_id).collect();
        assert_eq!(ids, vec!["10", "11", "12"]);
    }
}
