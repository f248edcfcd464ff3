// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

pub mod batch;
pub mod config;
pub mod episode;
pub mod error;
pub mod feed;
pub mod http;
pub mod matcher;
pub mod progress;
pub mod reconcile;
pub mod remote;
pub mod retention;
pub mod state;
pub mod sync;

#[cfg(test)]
mod test_support;

// Re-export main types for convenience
pub use config::{Config, ShowConfig};
pub use episode::{IndexingBackoff, PipelineOptions, UploadOutcome, UploadPipeline};
pub use error::{
    ApiError, ConfigError, DownloadError, FeedError, PipelineError, RequestError, StateError,
    SyncError,
};
pub use feed::{EpisodeRecord, ParsedFeed, ShowMetadata, fetch_feed, parse_feed};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use matcher::{belongs_to_show, exists_remotely};
pub use progress::{NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter};
pub use reconcile::reconcile_orphans;
pub use remote::{FileUpdate, MediaApi, Playlist, RemoteFile, StationClient};
pub use retention::{RetentionPolicy, enforce_retention, select_for_removal};
pub use state::{ProcessedEpisodes, ensure_scratch_dir};
pub use sync::{Pacing, RunContext, RunReport, SyncOptions, run_sync, unknown_playlists};
