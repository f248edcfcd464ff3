// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when fetching or parsing RSS feeds
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Failed to fetch feed from {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} fetching feed {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Timed out fetching feed {url}")]
    Timeout { url: String },

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("Failed to read feed body from {url}: {reason}")]
    InvalidBody { url: String, reason: String },

    #[error("Failed to parse RSS feed: {0}")]
    Parse(#[from] rss::Error),

    #[error("Invalid feed URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Errors from issuing a GET and walking its redirect chain
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Request to {url} failed: {source}")]
    Send {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Redirect from {url} has no usable Location header")]
    BadRedirect { url: String },

    #[error("Gave up on {url} after {hops} redirects")]
    TooManyRedirects { url: String, hops: usize },
}

/// Errors that can occur while transferring an asset or artwork to scratch storage
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("Invalid download URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("HTTP error {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Download of {url} timed out")]
    Timeout { url: String },

    #[error("Download of {url} produced no data")]
    Empty { url: String },

    #[error("Failed to create file {path}: {source}")]
    FileCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write to file {path}: {source}")]
    FileWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stream error while downloading {url}: {source}")]
    StreamFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Errors returned by the remote media platform
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Request to {endpoint} failed: {source}")]
    Request {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Unexpected response shape from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to build multipart body: {0}")]
    Multipart(String),
}

/// Errors fatal to a single episode upload attempt
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Asset download failed: {0}")]
    Download(#[from] DownloadError),

    #[error("Failed to read scratch file {path}: {source}")]
    ScratchRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Upload failed: {0}")]
    Upload(#[source] ApiError),

    #[error("Upload of {path} returned no remote identifier")]
    MissingRemoteId { path: String },

    #[error("File {file_id} was not indexed after {attempts} polls")]
    IndexingTimeout { file_id: String, attempts: u32 },

    #[error("Failed to apply metadata to file {file_id}: {source}")]
    Metadata {
        file_id: String,
        #[source]
        source: ApiError,
    },
}

/// Errors around the persisted processed-episode set and scratch storage
#[derive(Error, Debug)]
pub enum StateError {
    #[error("Failed to read state file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write state file {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse state JSON in {path}: {source}")]
    JsonParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize state: {0}")]
    JsonSerializeFailed(#[from] serde_json::Error),

    #[error("Failed to create directory {path}: {source}")]
    CreateDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level errors that abort a whole run
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Remote listing unavailable: {0}")]
    Listing(#[from] ApiError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}
