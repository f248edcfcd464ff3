// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::Duration;

use tracing::{info, warn};

use crate::batch::{BatchReport, apply_each};
use crate::error::ApiError;
use crate::remote::{MediaApi, RemoteFile};
use crate::sync::RunContext;

pub type ReconcileReport = BatchReport<RemoteFile, (), ApiError>;

/// Split the snapshot into default-playlist members and orphans
pub fn partition_orphans(
    files: &[RemoteFile],
    default_playlist: &str,
) -> (Vec<RemoteFile>, Vec<RemoteFile>) {
    files
        .iter()
        .cloned()
        .partition(|file| file.in_playlist(default_playlist))
}

/// Permanently delete every remote file outside `default_playlist`.
///
/// Does nothing without a default playlist. After at least one deletion
/// the listing in `ctx` is re-fetched; if that fails, deleted files are
/// dropped from the snapshot instead.
pub async fn reconcile_orphans<A: MediaApi + ?Sized>(
    api: &A,
    ctx: &mut RunContext,
    default_playlist: Option<&str>,
    pacing: Duration,
) -> ReconcileReport {
    let Some(default_playlist) = default_playlist else {
        return ReconcileReport::default();
    };

    let (members, orphans) = partition_orphans(&ctx.remote_files, default_playlist);
    info!(
        default_playlist,
        members = members.len(),
        orphans = orphans.len(),
        "reconciling orphaned files"
    );

    let report = apply_each(orphans, pacing, |file| async move {
        api.delete_file(&file.id).await
    })
    .await;

    for (file, error) in report.failures() {
        warn!(file_id = %file.id, title = %file.title, error = %error, "failed to delete orphan");
    }

    if report.succeeded() > 0 {
        if let Err(e) = ctx.refresh_listing(api).await {
            warn!(error = %e, "could not refresh remote listing after orphan cleanup");
            let deleted: Vec<&str> = report.successes().map(|(f, _)| f.id.as_str()).collect();
            ctx.remote_files.retain(|f| !deleted.contains(&f.id.as_str()));
        }
    }

    report
}
