// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::StateError;

/// Identifiers of episodes already handled in earlier runs.
///
/// Append-only: an id goes in after a confirmed upload or a confirmed
/// remote match and is never taken out again. The backing file is a JSON
/// array rewritten in full by [`ProcessedEpisodes::persist`].
#[derive(Debug, Clone)]
pub struct ProcessedEpisodes {
    path: PathBuf,
    ids: BTreeSet<String>,
}

impl ProcessedEpisodes {
    /// Load the set from `path`; a missing file is an empty set
    pub fn load(path: &Path) -> Result<Self, StateError> {
        if !path.exists() {
            debug!(path = %path.display(), "no processed-episode state yet");
            return Ok(Self::empty(path));
        }

        let content = std::fs::read_to_string(path).map_err(|e| StateError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        let ids: Vec<String> = if content.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&content).map_err(|e| StateError::JsonParseFailed {
                path: path.to_path_buf(),
                source: e,
            })?
        };

        Ok(Self {
            path: path.to_path_buf(),
            ids: ids.into_iter().collect(),
        })
    }

    pub fn empty(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            ids: BTreeSet::new(),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Record an id; returns false if it was already present
    pub fn add(&mut self, id: &str) -> bool {
        self.ids.insert(id.to_string())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrite the whole backing file
    pub fn persist(&self) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| StateError::CreateDirectoryFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let ids: Vec<&String> = self.ids.iter().collect();
        let json = serde_json::to_string_pretty(&ids)?;
        std::fs::write(&self.path, json).map_err(|e| StateError::WriteFailed {
            path: self.path.clone(),
            source: e,
        })?;

        debug!(path = %self.path.display(), count = self.ids.len(), "persisted processed episodes");
        Ok(())
    }
}

/// Create the scratch directory if it does not exist yet
pub fn ensure_scratch_dir(path: &Path) -> Result<(), StateError> {
    std::fs::create_dir_all(path).map_err(|e| StateError::CreateDirectoryFailed {
        path: path.to_path_buf(),
        source: e,
    })
}
