//! Configuration loading and parsing for `patchback.toml` files.
//!
//! Every field is optional; a missing file yields the defaults.
use log::*;
use serde::Deserialize;
use std::path::Path;

use crate::{PatchbackError, Result, forge::config::DEFAULT_API_BASE_URI};

/// Default configuration filename.
pub const DEFAULT_CONFIG_FILE: &str = "patchback.toml";
/// Labels starting with this prefix request a backport to the remainder.
pub const DEFAULT_LABEL_PREFIX: &str = "backport-";
/// Default size of the blocking pool running git operations.
pub const DEFAULT_MAX_CONCURRENT_BACKPORTS: usize = 4;
/// Default committer name on backport commits.
pub const DEFAULT_COMMITTER_NAME: &str = "Patchback";
/// Default committer email on backport commits.
pub const DEFAULT_COMMITTER_EMAIL: &str = "patchback@sanitizers.bot";

/// What to do when replaying a merge commit leaves conflicted entries.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Stop and report the conflicted paths without pushing anything.
    #[default]
    Abort,
    /// Write conflict markers into the affected files and commit anyway.
    CommitMarkers,
}

/// Identity recorded as committer on backport commits.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CommitterConfig {
    pub name: String,
    pub email: String,
}

impl Default for CommitterConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_COMMITTER_NAME.into(),
            email: DEFAULT_COMMITTER_EMAIL.into(),
        }
    }
}

/// Root configuration structure for `patchback.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Prefix identifying backport labels (default: "backport-").
    pub label_prefix: String,
    /// Maximum number of clone/cherry-pick/push jobs running at once.
    pub max_concurrent_backports: usize,
    /// Handling of conflicted cherry-picks (default: abort).
    pub conflict_policy: ConflictPolicy,
    /// Committer identity for backport commits.
    pub committer: CommitterConfig,
    /// Base URI of the hosting REST API.
    pub api_base_uri: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            label_prefix: DEFAULT_LABEL_PREFIX.into(),
            max_concurrent_backports: DEFAULT_MAX_CONCURRENT_BACKPORTS,
            conflict_policy: ConflictPolicy::default(),
            committer: CommitterConfig::default(),
            api_base_uri: DEFAULT_API_BASE_URI.into(),
        }
    }
}

impl Config {
    /// Parse and validate configuration from TOML content.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist.
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("no configuration found at {}: using default", path.display());
            return Ok(Config::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        Self::from_toml(&content)
    }

    fn validate(&self) -> Result<()> {
        if self.label_prefix.is_empty() {
            return Err(PatchbackError::invalid_config(
                "label_prefix must not be empty",
            ));
        }

        if self.max_concurrent_backports == 0 {
            return Err(PatchbackError::invalid_config(
                "max_concurrent_backports must be at least 1",
            ));
        }

        Ok(())
    }
}
