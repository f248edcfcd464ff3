// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-show retention. Files past the count or age cap are taken out of
//! every playlist; the asset itself stays on the station.

use std::cmp::Reverse;
use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::batch::{BatchReport, apply_each};
use crate::error::ApiError;
use crate::feed::ShowMetadata;
use crate::matcher::belongs_to_show;
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::remote::{FileUpdate, MediaApi, RemoteFile};
use crate::sync::RunContext;

/// Caps for one show's playlist-assigned files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub max_episodes: usize,
    pub max_age_days: i64,
}

/// A show whose feed was parsed this run, with its policy
#[derive(Debug, Clone)]
pub struct RetentionTarget {
    pub show: ShowMetadata,
    pub policy: RetentionPolicy,
}

/// Outcome of the retention phase; each item is a file that was selected
pub type RetentionReport = BatchReport<RemoteFile, (), ApiError>;

/// Files to unassign, newest first.
///
/// `files` are ranked by upload time descending (undated last). A file is
/// selected when its rank is at or beyond `max_episodes` or when it is
/// more than `max_age_days` whole days old. Undated files are judged by
/// rank only.
///
/// Callers pass only playlist-assigned files (see [`assigned_show_files`]),
/// so a matched file that is in no playlist, e.g. one whose assignment
/// failed after upload, does not occupy a rank slot.
pub fn select_for_removal(
    files: &[RemoteFile],
    policy: RetentionPolicy,
    now: DateTime<Utc>,
) -> Vec<RemoteFile> {
    let mut ranked: Vec<&RemoteFile> = files.iter().collect();
    ranked.sort_by_key(|file| Reverse(file.uploaded_at));

    ranked
        .into_iter()
        .enumerate()
        .filter(|(rank, file)| {
            let over_count = *rank >= policy.max_episodes;
            let over_age = file
                .uploaded_at
                .is_some_and(|at| (now - at).num_days() > policy.max_age_days);
            over_count || over_age
        })
        .map(|(_, file)| file.clone())
        .collect()
}

/// Playlist-assigned files on the station that belong to `show`
pub fn assigned_show_files(files: &[RemoteFile], show: &ShowMetadata) -> Vec<RemoteFile> {
    files
        .iter()
        .filter(|file| file.is_assigned() && belongs_to_show(file, show))
        .cloned()
        .collect()
}

/// Unassign every file past its show's caps.
///
/// The remote listing is refreshed first; if that fails the existing
/// snapshot is used. Failures on individual files are recorded in the
/// report and never stop the pass.
pub async fn enforce_retention<A: MediaApi + ?Sized>(
    api: &A,
    ctx: &mut RunContext,
    targets: &[RetentionTarget],
    pacing: Duration,
    now: DateTime<Utc>,
    reporter: &SharedProgressReporter,
) -> RetentionReport {
    let mut report = RetentionReport::default();
    if targets.is_empty() {
        return report;
    }

    if let Err(e) = ctx.refresh_listing(api).await {
        warn!(error = %e, "could not refresh remote listing, applying retention to the last snapshot");
    }

    let mut handled: HashSet<String> = HashSet::new();

    for target in targets {
        let candidates = assigned_show_files(&ctx.remote_files, &target.show);
        let selected: Vec<RemoteFile> = select_for_removal(&candidates, target.policy, now)
            .into_iter()
            .filter(|file| handled.insert(file.id.clone()))
            .collect();

        debug!(
            show = %target.show.title,
            assigned = candidates.len(),
            selected = selected.len(),
            "retention selection"
        );
        if selected.is_empty() {
            continue;
        }

        let clear = FileUpdate::clear_playlists();
        let batch = apply_each(selected, pacing, |file| {
            let clear = &clear;
            async move { api.update_file(&file.id, clear).await }
        })
        .await;

        for (file, _) in batch.successes() {
            info!(show = %target.show.title, file_id = %file.id, title = %file.title, "unassigned from playlists");
            if let Some(snapshot) = ctx.remote_files.iter_mut().find(|f| f.id == file.id) {
                snapshot.playlists.clear();
            }
        }
        for (file, error) in batch.failures() {
            warn!(show = %target.show.title, file_id = %file.id, error = %error, "failed to unassign file");
        }

        reporter.report(ProgressEvent::RetentionApplied {
            show_title: target.show.title.clone(),
            unassigned: batch.succeeded(),
            failed: batch.failed(),
        });
        report.results.extend(batch.results);
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopReporter;
    use crate::state::ProcessedEpisodes;
    use crate::test_support::{FakeMediaApi, remote_file, show};
    use chrono::TimeZone;
    use std::path::Path;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn days_ago(days: i64) -> Option<DateTime<Utc>> {
        Some(now() - chrono::Duration::days(days))
    }

    fn policy(max_episodes: usize, max_age_days: i64) -> RetentionPolicy {
        RetentionPolicy {
            max_episodes,
            max_age_days,
        }
    }

    fn ids(files: &[RemoteFile]) -> Vec<&str> {
        files.iter().map(|f| f.id.as_str()).collect()
    }

    fn context(api: &FakeMediaApi) -> RunContext {
        RunContext::new(api.state().files.clone(), ProcessedEpisodes::empty(Path::new("unused.json")))
    }

    #[test]
    fn selects_files_beyond_the_count_cap() {
        let files: Vec<RemoteFile> = (0..8)
            .map(|i| remote_file(&format!("f{i}"), "t", "Host", "", days_ago(i), &["7"]))
            .collect();

        let selected = select_for_removal(&files, policy(5, 365), now());

        assert_eq!(ids(&selected), vec!["f5", "f6", "f7"]);
    }

    #[test]
    fn age_cap_applies_within_the_top_ranks() {
        let files = vec![
            remote_file("new", "t", "Host", "", days_ago(1), &["7"]),
            remote_file("old", "t", "Host", "", days_ago(400), &["7"]),
        ];

        let selected = select_for_removal(&files, policy(5, 365), now());

        assert_eq!(ids(&selected), vec!["old"]);
    }

    #[test]
    fn age_is_counted_in_whole_days() {
        let files = vec![remote_file(
            "edge",
            "t",
            "Host",
            "",
            Some(now() - chrono::Duration::days(30) - chrono::Duration::hours(23)),
            &["7"],
        )];

        assert!(select_for_removal(&files, policy(5, 30), now()).is_empty());
    }

    #[test]
    fn undated_files_rank_last_and_ignore_age() {
        let files = vec![
            remote_file("undated", "t", "Host", "", None, &["7"]),
            remote_file("a", "t", "Host", "", days_ago(3), &["7"]),
            remote_file("b", "t", "Host", "", days_ago(2), &["7"]),
        ];

        assert_eq!(ids(&select_for_removal(&files, policy(2, 365), now())), vec!["undated"]);
        assert!(select_for_removal(&files, policy(5, 0), now())
            .iter()
            .all(|f| f.id != "undated"));
    }

    #[test]
    fn only_assigned_files_of_the_show_are_candidates() {
        let files = vec![
            remote_file("mine", "t", "Host", "", None, &["7"]),
            remote_file("unassigned", "t", "Host", "", None, &[]),
            remote_file("other", "t", "Someone Else", "Other Show", None, &["7"]),
        ];

        let candidates = assigned_show_files(&files, &show("My Show", "Host"));

        assert_eq!(ids(&candidates), vec!["mine"]);
    }

    #[tokio::test]
    async fn unassigned_newer_file_does_not_take_a_rank_slot() {
        let api = FakeMediaApi::with_files(vec![
            remote_file("fresh-unassigned", "t", "Host", "", days_ago(0), &[]),
            remote_file("a", "t", "Host", "", days_ago(1), &["7"]),
            remote_file("b", "t", "Host", "", days_ago(2), &["7"]),
        ]);
        let mut ctx = context(&api);
        let targets = vec![RetentionTarget {
            show: show("My Show", "Host"),
            policy: policy(2, 365),
        }];

        let report = enforce_retention(
            &api,
            &mut ctx,
            &targets,
            Duration::ZERO,
            now(),
            &NoopReporter::shared(),
        )
        .await;

        assert!(report.is_empty());
        assert!(api.state().updates.is_empty());
    }

    #[tokio::test]
    async fn enforcement_unassigns_and_continues_after_failures() {
        let files: Vec<RemoteFile> = (0..8)
            .map(|i| remote_file(&format!("f{i}"), "t", "Host", "", days_ago(i), &["7"]))
            .collect();
        let api = FakeMediaApi::with_files(files);
        api.state().fail_unassign.insert("f6".to_string());
        let mut ctx = context(&api);
        let targets = vec![RetentionTarget {
            show: show("My Show", "Host"),
            policy: policy(5, 365),
        }];

        let report = enforce_retention(
            &api,
            &mut ctx,
            &targets,
            Duration::ZERO,
            now(),
            &NoopReporter::shared(),
        )
        .await;

        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);

        let state = api.state();
        assert!(state.deleted.is_empty());
        let still_assigned: Vec<&str> = state
            .files
            .iter()
            .filter(|f| f.is_assigned())
            .map(|f| f.id.as_str())
            .collect();
        assert_eq!(still_assigned, vec!["f0", "f1", "f2", "f3", "f4", "f6"]);
    }

    #[tokio::test]
    async fn enforcement_refreshes_the_listing_first() {
        let api = FakeMediaApi::with_files(vec![remote_file(
            "f0",
            "t",
            "Host",
            "",
            days_ago(1),
            &["7"],
        )]);
        let mut ctx = RunContext::new(Vec::new(), ProcessedEpisodes::empty(Path::new("unused.json")));
        api.state().files.push(remote_file("late", "t", "Host", "", days_ago(500), &["7"]));
        let targets = vec![RetentionTarget {
            show: show("My Show", "Host"),
            policy: policy(5, 365),
        }];

        let report = enforce_retention(
            &api,
            &mut ctx,
            &targets,
            Duration::ZERO,
            now(),
            &NoopReporter::shared(),
        )
        .await;

        assert_eq!(api.state().list_calls, 1);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.results[0].item.id, "late");
    }

    #[tokio::test]
    async fn no_targets_means_no_remote_calls() {
        let api = FakeMediaApi::new();
        let mut ctx = context(&api);

        let report = enforce_retention(
            &api,
            &mut ctx,
            &[],
            Duration::ZERO,
            now(),
            &NoopReporter::shared(),
        )
        .await;

        assert!(report.is_empty());
        assert_eq!(api.state().list_calls, 0);
    }
}
