// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::batch::apply_each;
use crate::config::{Config, ShowConfig};
use crate::episode::{IndexingBackoff, PipelineOptions, UploadPipeline};
use crate::error::{ApiError, SyncError};
use crate::feed::{EpisodeRecord, ShowMetadata, fetch_feed};
use crate::http::HttpClient;
use crate::matcher::exists_remotely;
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::reconcile::{partition_orphans, reconcile_orphans};
use crate::remote::{MediaApi, RemoteFile};
use crate::retention::{
    RetentionTarget, assigned_show_files, enforce_retention, select_for_removal,
};
use crate::state::ProcessedEpisodes;

/// Run-scoped mutable state: the remote snapshot and the processed set
#[derive(Debug)]
pub struct RunContext {
    pub remote_files: Vec<RemoteFile>,
    pub processed: ProcessedEpisodes,
}

impl RunContext {
    pub fn new(remote_files: Vec<RemoteFile>, processed: ProcessedEpisodes) -> Self {
        Self {
            remote_files,
            processed,
        }
    }

    /// Take the initial remote listing. Failure aborts the run.
    pub async fn initialize<A: MediaApi + ?Sized>(
        api: &A,
        processed: ProcessedEpisodes,
    ) -> Result<Self, SyncError> {
        let remote_files = api.list_files().await?;
        debug!(files = remote_files.len(), "initial remote listing");
        Ok(Self::new(remote_files, processed))
    }

    /// Replace the snapshot with a fresh listing
    pub async fn refresh_listing<A: MediaApi + ?Sized>(&mut self, api: &A) -> Result<(), ApiError> {
        self.remote_files = api.list_files().await?;
        Ok(())
    }
}

/// Delays between consecutive remote operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Between episode uploads
    pub upload: Duration,
    /// Between per-file retention and orphan calls
    pub api: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            upload: Duration::from_secs(2),
            api: Duration::from_millis(500),
        }
    }
}

/// Options for an ingestion run
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Maximum number of episodes to upload (None = all)
    pub limit: Option<usize>,
    /// Log the plan without touching the station or the state file
    pub dry_run: bool,
    pub pacing: Pacing,
    pub backoff: IndexingBackoff,
}

/// Aggregate result of a run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub orphans_deleted: usize,
    pub orphans_failed: usize,
    pub shows_processed: usize,
    /// (show label, error message)
    pub shows_failed: Vec<(String, String)>,
    pub uploaded: usize,
    /// (episode title, error message)
    pub failed_uploads: Vec<(String, String)>,
    /// Episodes found on the station and marked processed without uploading
    pub already_present: usize,
    pub skipped_processed: usize,
    /// Repeats of an id already queued this run (duplicate guids)
    pub skipped_duplicates: usize,
    /// New episodes left for a later run by the upload limit
    pub deferred: usize,
    /// Titles that would have been uploaded (dry run only)
    pub planned: Vec<String>,
    pub retention_unassigned: usize,
    pub retention_failed: usize,
}

impl RunReport {
    /// Uploads were attempted and none succeeded
    pub fn all_uploads_failed(&self) -> bool {
        !self.failed_uploads.is_empty() && self.uploaded == 0
    }
}

/// A new episode waiting for the upload phase
#[derive(Debug, Clone)]
struct QueuedEpisode {
    episode: EpisodeRecord,
    show: ShowMetadata,
    playlist: String,
}

/// Playlist ids referenced by the config that the station does not know
pub async fn unknown_playlists<A: MediaApi + ?Sized>(
    api: &A,
    config: &Config,
) -> Result<Vec<String>, ApiError> {
    let known: HashSet<String> = api
        .list_playlists()
        .await?
        .into_iter()
        .map(|p| p.id)
        .collect();

    let mut missing: Vec<String> = config
        .default_playlist
        .iter()
        .chain(config.enabled_shows().map(|show| &show.playlist))
        .filter(|id| !known.contains(*id))
        .cloned()
        .collect();
    missing.sort();
    missing.dedup();
    Ok(missing)
}

/// Run one full ingestion pass over every enabled show.
///
/// 1. Delete orphans outside the default playlist
/// 2. Fetch and parse each feed, filtering out processed and present episodes
/// 3. Upload new episodes oldest first, across all shows
/// 4. Persist the processed set
/// 5. Enforce retention on every show whose feed was parsed
pub async fn run_sync<H, A>(
    http: &H,
    api: &A,
    config: &Config,
    ctx: &mut RunContext,
    options: &SyncOptions,
    reporter: SharedProgressReporter,
) -> Result<RunReport, SyncError>
where
    H: HttpClient + ?Sized,
    A: MediaApi + ?Sized,
{
    let mut report = RunReport::default();
    let default_playlist = config.default_playlist.as_deref();

    // Orphans
    if options.dry_run {
        if let Some(default) = default_playlist {
            let (_, orphans) = partition_orphans(&ctx.remote_files, default);
            for orphan in &orphans {
                info!(file_id = %orphan.id, title = %orphan.title, "dry run: would delete orphan");
            }
        }
    } else {
        let orphans = reconcile_orphans(api, ctx, default_playlist, options.pacing.api).await;
        report.orphans_deleted = orphans.succeeded();
        report.orphans_failed = orphans.failed();
        if !orphans.is_empty() {
            reporter.report(ProgressEvent::OrphansReconciled {
                deleted: report.orphans_deleted,
                failed: report.orphans_failed,
            });
        }
    }

    // Feeds
    let mut queue: Vec<QueuedEpisode> = Vec::new();
    let mut targets: Vec<RetentionTarget> = Vec::new();
    let mut queued_ids: HashSet<String> = HashSet::new();

    for show_config in config.enabled_shows() {
        let Some((show, new_episodes)) =
            collect_show(http, ctx, show_config, &mut queued_ids, &mut report, &reporter).await
        else {
            continue;
        };

        queue.extend(new_episodes.into_iter().map(|episode| QueuedEpisode {
            episode,
            show: show.clone(),
            playlist: show_config.playlist.clone(),
        }));
        targets.push(RetentionTarget {
            show,
            policy: show_config.retention_policy(),
        });
    }

    // Oldest first across shows; undated episodes lead
    queue.sort_by_key(|item| item.episode.published);
    if let Some(limit) = options.limit
        && queue.len() > limit
    {
        report.deferred = queue.len() - limit;
        queue.truncate(limit);
        info!(limit, deferred = report.deferred, "upload limit reached");
    }

    if options.dry_run {
        for item in &queue {
            info!(show = %item.show.title, episode = %item.episode.title, "dry run: would upload");
            report.planned.push(item.episode.title.clone());
        }
        for target in &targets {
            let assigned = assigned_show_files(&ctx.remote_files, &target.show);
            for file in select_for_removal(&assigned, target.policy, Utc::now()) {
                info!(show = %target.show.title, file_id = %file.id, title = %file.title, "dry run: would unassign");
            }
        }
        return Ok(report);
    }

    // Uploads
    let pipeline_options = PipelineOptions {
        backoff: options.backoff.clone(),
        default_playlist: config.default_playlist.clone(),
        ..PipelineOptions::new(&config.scratch_dir)
    };
    let pipeline = UploadPipeline::new(http, api, &pipeline_options, reporter.clone());
    let events = &reporter;
    let total = queue.len();
    let mut index = 0;

    let uploads = apply_each(queue, options.pacing.upload, |item| {
        events.report(ProgressEvent::UploadStarting {
            episode_title: item.episode.title.clone(),
            show_title: item.show.title.clone(),
            index,
            total,
        });
        index += 1;
        let pipeline = &pipeline;
        async move {
            let result = pipeline
                .process(&item.episode, &item.show, &item.playlist)
                .await;
            match &result {
                Ok(_) => events.report(ProgressEvent::UploadCompleted {
                    episode_title: item.episode.title.clone(),
                }),
                Err(e) => events.report(ProgressEvent::UploadFailed {
                    episode_title: item.episode.title.clone(),
                    error: e.to_string(),
                }),
            }
            result
        }
    })
    .await;

    for (item, outcome) in uploads.successes() {
        info!(
            show = %item.show.title,
            episode = %item.episode.title,
            file_id = %outcome.file_id,
            "episode uploaded"
        );
        ctx.processed.add(&item.episode.id);
    }
    for (item, error) in uploads.failures() {
        warn!(show = %item.show.title, episode = %item.episode.title, error = %error, "episode upload failed");
    }
    report.uploaded = uploads.succeeded();
    report.failed_uploads = uploads.failure_messages(|item| item.episode.title.clone());

    ctx.processed.persist()?;

    // Retention
    let retention = enforce_retention(
        api,
        ctx,
        &targets,
        options.pacing.api,
        Utc::now(),
        &reporter,
    )
    .await;
    report.retention_unassigned = retention.succeeded();
    report.retention_failed = retention.failed();

    reporter.report(ProgressEvent::SyncCompleted {
        uploaded: report.uploaded,
        already_present: report.already_present,
        failed: report.failed_uploads.len(),
    });

    Ok(report)
}

/// Fetch one show's feed and return its metadata plus episodes still to
/// upload. `None` when the feed is unusable this run.
///
/// `queued_ids` spans the whole run, so an id repeated within a feed or
/// across feeds is queued once.
async fn collect_show<H: HttpClient + ?Sized>(
    http: &H,
    ctx: &mut RunContext,
    show_config: &ShowConfig,
    queued_ids: &mut HashSet<String>,
    report: &mut RunReport,
    reporter: &SharedProgressReporter,
) -> Option<(ShowMetadata, Vec<EpisodeRecord>)> {
    reporter.report(ProgressEvent::FetchingFeed {
        url: show_config.feed_url.clone(),
    });

    let feed = match fetch_feed(http, &show_config.feed_url).await {
        Ok(feed) => feed,
        Err(e) => {
            warn!(show = %show_config.label(), error = %e, "skipping show, feed unavailable");
            reporter.report(ProgressEvent::FeedFailed {
                url: show_config.feed_url.clone(),
                error: e.to_string(),
            });
            report
                .shows_failed
                .push((show_config.label().to_string(), e.to_string()));
            return None;
        }
    };
    report.shows_processed += 1;

    let total_episodes = feed.episodes.len();
    let mut new_episodes = Vec::new();

    for episode in feed.episodes {
        if ctx.processed.contains(&episode.id) {
            report.skipped_processed += 1;
            continue;
        }
        if queued_ids.contains(&episode.id) {
            debug!(show = %feed.show.title, episode = %episode.title, id = %episode.id, "duplicate episode id, skipping");
            report.skipped_duplicates += 1;
            continue;
        }
        if exists_remotely(&episode, &feed.show, &ctx.remote_files) {
            debug!(show = %feed.show.title, episode = %episode.title, "already on the station");
            ctx.processed.add(&episode.id);
            report.already_present += 1;
            continue;
        }
        queued_ids.insert(episode.id.clone());
        new_episodes.push(episode);
    }

    info!(
        show = %feed.show.title,
        total = total_episodes,
        new = new_episodes.len(),
        "feed parsed"
    );
    reporter.report(ProgressEvent::FeedParsed {
        show_title: feed.show.title.clone(),
        total_episodes,
        new_episodes: new_episodes.len(),
    });

    Some((feed.show, new_episodes))
}
