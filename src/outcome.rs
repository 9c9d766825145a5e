//! Classified backport failures.
//!
//! These are the expected ways a backport can be turned down: they are
//! logged, reflected on the check run as a neutral conclusion, and never
//! propagated further. Infrastructure faults travel through
//! [`crate::error::PatchbackError`] instead.

use thiserror::Error;

/// Tagged result of a backport step: `Ok` carries the step's product,
/// `Err` a classified failure.
pub type Outcome<T> = std::result::Result<T, BackportFailure>;

/// Expected reasons a backport does not produce a pull request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackportFailure {
    #[error("Failed to check out branch {branch}: it does not exist")]
    TargetBranchMissing { branch: String },

    #[error(
        "Current GitHub App installation does not grant sufficient privileges for pushing to {remote}. `Contents: write` permission is necessary to fix this."
    )]
    PushPermissionDenied { remote: String },

    #[error(
        "Backport branch {branch} already exists on the remote: refusing to overwrite it"
    )]
    BackportBranchExists { branch: String },

    #[error("Cherry-picking produced conflicts in: {}", paths.join(", "))]
    MergeConflict { paths: Vec<String> },

    #[error("{0}")]
    PrValidationFailed(String),

    #[error(
        "Current GitHub App installation does not grant sufficient privileges to create pull requests: {0}"
    )]
    PrPermissionDenied(String),
}

impl BackportFailure {
    /// Short description used as the check run title suffix.
    pub fn headline(&self) -> &'static str {
        match self {
            Self::TargetBranchMissing { .. } => {
                "cherry-picking failed — target branch does not exist"
            }
            Self::PushPermissionDenied { .. } => {
                "cherry-picking failed — could not push"
            }
            Self::BackportBranchExists { .. } => {
                "cherry-picking skipped — backport branch already exists"
            }
            Self::MergeConflict { .. } => {
                "cherry-picking failed — merge conflicts"
            }
            Self::PrValidationFailed(_) | Self::PrPermissionDenied(_) => {
                "creation of the backport PR failed"
            }
        }
    }

    /// Whether the failure happened after the backport branch was pushed.
    pub fn branch_pushed(&self) -> bool {
        matches!(
            self,
            Self::PrValidationFailed(_) | Self::PrPermissionDenied(_)
        )
    }
}
