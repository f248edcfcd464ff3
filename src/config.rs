// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use url::Url;

use crate::error::ConfigError;
use crate::retention::RetentionPolicy;

/// Environment variable that overrides `api_key` from the file
pub const API_KEY_ENV: &str = "PODSTATION_API_KEY";

fn default_state_file() -> PathBuf {
    PathBuf::from("processed_episodes.json")
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("podstation")
}

fn default_max_episodes() -> usize {
    10
}

fn default_max_age_days() -> i64 {
    365
}

fn default_enabled() -> bool {
    true
}

/// Top-level configuration file
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base URL of the station platform, e.g. `https://radio.example.com`
    pub host: String,
    pub station: String,
    #[serde(default)]
    pub api_key: String,
    /// Files outside this playlist are deleted at the start of each run
    #[serde(default)]
    pub default_playlist: Option<String>,
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
    #[serde(default)]
    pub shows: Vec<ShowConfig>,
}

/// One podcast feed and the playlist it feeds
#[derive(Debug, Clone, Deserialize)]
pub struct ShowConfig {
    pub feed_url: String,
    #[serde(default = "default_max_episodes")]
    pub max_episodes: usize,
    #[serde(default = "default_max_age_days")]
    pub max_age_days: i64,
    pub playlist: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Only used in logs
    #[serde(default)]
    pub name: Option<String>,
}

impl ShowConfig {
    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            max_episodes: self.max_episodes,
            max_age_days: self.max_age_days,
        }
    }

    /// Name for log lines: the configured name, else the feed URL
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.feed_url)
    }
}

impl Config {
    /// Read, apply the environment override, and validate
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut config = Self::from_json(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        if let Ok(key) = std::env::var(API_KEY_ENV)
            && !key.trim().is_empty()
        {
            config.api_key = key;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let host = Url::parse(&self.host)
            .map_err(|e| ConfigError::Invalid(format!("host {:?}: {e}", self.host)))?;
        if !matches!(host.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "host {:?} must be http or https",
                self.host
            )));
        }
        if self.station.trim().is_empty() {
            return Err(ConfigError::Invalid("station must not be empty".to_string()));
        }
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "api_key must be set in the file or via {API_KEY_ENV}"
            )));
        }
        if self
            .default_playlist
            .as_deref()
            .is_some_and(|p| p.trim().is_empty())
        {
            return Err(ConfigError::Invalid(
                "default_playlist must not be blank".to_string(),
            ));
        }

        for show in &self.shows {
            Url::parse(&show.feed_url).map_err(|e| {
                ConfigError::Invalid(format!("feed_url {:?}: {e}", show.feed_url))
            })?;
            if show.playlist.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "show {} has no playlist",
                    show.label()
                )));
            }
            if show.max_episodes == 0 || show.max_age_days <= 0 {
                return Err(ConfigError::Invalid(format!(
                    "show {} needs positive max_episodes and max_age_days",
                    show.label()
                )));
            }
        }
        Ok(())
    }

    pub fn enabled_shows(&self) -> impl Iterator<Item = &ShowConfig> {
        self.shows.iter().filter(|show| show.enabled)
    }
}
