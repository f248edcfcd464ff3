// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;
use std::time::Duration;

/// Events emitted during an ingestion run for progress reporting
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Orphan cleanup finished
    OrphansReconciled { deleted: usize, failed: usize },

    /// Feed is being fetched from URL
    FetchingFeed { url: String },

    /// Feed has been parsed and filtered
    FeedParsed {
        show_title: String,
        total_episodes: usize,
        new_episodes: usize,
    },

    /// Feed could not be fetched or parsed; the show is skipped this run
    FeedFailed { url: String, error: String },

    /// An episode is entering the upload pipeline
    UploadStarting {
        episode_title: String,
        show_title: String,
        /// Position of this episode in the global upload queue
        index: usize,
        total: usize,
    },

    /// Asset download progress
    TransferProgress {
        bytes_downloaded: u64,
        total_bytes: Option<u64>,
    },

    /// Waiting before the next indexing poll
    WaitingForIndexing {
        episode_title: String,
        /// 1-based
        attempt: u32,
        max_attempts: u32,
        delay: Duration,
    },

    UploadCompleted { episode_title: String },

    UploadFailed { episode_title: String, error: String },

    /// Retention pass over one show's playlist finished
    RetentionApplied {
        show_title: String,
        unassigned: usize,
        failed: usize,
    },

    /// The run completed
    SyncCompleted {
        uploaded: usize,
        already_present: usize,
        failed: usize,
    },
}

/// Trait for reporting progress events during a run.
///
/// Implementations can use this to display progress bars, log messages,
/// or collect statistics.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// A no-op progress reporter that silently ignores all events.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {}
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_reporter_handles_all_events() {
        let reporter = NoopReporter::shared();

        reporter.report(ProgressEvent::OrphansReconciled {
            deleted: 2,
            failed: 0,
        });
        reporter.report(ProgressEvent::FetchingFeed {
            url: "https://example.com/feed.xml".to_string(),
        });
        reporter.report(ProgressEvent::FeedParsed {
            show_title: "Test Show".to_string(),
            total_episodes: 10,
            new_episodes: 5,
        });
        reporter.report(ProgressEvent::FeedFailed {
            url: "https://example.com/feed.xml".to_string(),
            error: "timed out".to_string(),
        });
        reporter.report(ProgressEvent::UploadStarting {
            episode_title: "Episode 1".to_string(),
            show_title: "Test Show".to_string(),
            index: 0,
            total: 5,
        });
        reporter.report(ProgressEvent::TransferProgress {
            bytes_downloaded: 512,
            total_bytes: Some(1024),
        });
        reporter.report(ProgressEvent::WaitingForIndexing {
            episode_title: "Episode 1".to_string(),
            attempt: 1,
            max_attempts: 10,
            delay: Duration::from_secs(30),
        });
        reporter.report(ProgressEvent::UploadCompleted {
            episode_title: "Episode 1".to_string(),
        });
        reporter.report(ProgressEvent::UploadFailed {
            episode_title: "Episode 2".to_string(),
            error: "Connection timeout".to_string(),
        });
        reporter.report(ProgressEvent::RetentionApplied {
            show_title: "Test Show".to_string(),
            unassigned: 3,
            failed: 0,
        });
        reporter.report(ProgressEvent::SyncCompleted {
            uploaded: 4,
            already_present: 5,
            failed: 1,
        });
    }
}
