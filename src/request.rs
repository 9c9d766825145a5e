//! Backport requests and the names derived from them.
use std::fmt;

use crate::forge::request::CreatePrRequest;

/// Prefix of every branch pushed by Patchback.
pub const BACKPORT_BRANCH_PREFIX: &str = "backports";

/// Length of the abbreviated merge commit used in PR titles.
pub const SHORT_SHA_LEN: usize = 8;

/// Deterministic name of the branch carrying a backport:
/// `backports/<target_branch>/<merge_commit_sha>/pr<pr_number>`.
///
/// The sha segment never contains `/` and the last segment is always
/// `pr<digits>`, so distinct triples map to distinct names even when the
/// target branch itself is nested (`release/1.x`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackportBranchName(String);

impl BackportBranchName {
    pub fn new(target_branch: &str, merge_commit_sha: &str, pr_number: u64) -> Self {
        Self(format!(
            "{BACKPORT_BRANCH_PREFIX}/{target_branch}/{merge_commit_sha}/pr{pr_number}"
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackportBranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One (pull request, target branch) pair to backport. Built once at the
/// webhook boundary and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackportRequest {
    pub pr_number: u64,
    pub pr_title: String,
    pub pr_body: String,
    /// Branch the original PR was merged into.
    pub base_ref: String,
    /// Branch the original PR was opened from.
    pub head_ref: String,
    /// Head commit of the original PR, when the payload carries it.
    pub head_sha: Option<String>,
    pub merge_commit_sha: String,
    pub target_branch: String,
    /// `owner/repo`
    pub repo_slug: String,
    pub clone_url: String,
    /// Pull request collection endpoint of the repository.
    pub pulls_api_url: String,
}

impl BackportRequest {
    pub fn branch_name(&self) -> BackportBranchName {
        BackportBranchName::new(
            &self.target_branch,
            &self.merge_commit_sha,
            self.pr_number,
        )
    }

    pub fn short_sha(&self) -> &str {
        self.merge_commit_sha
            .get(..SHORT_SHA_LEN)
            .unwrap_or(&self.merge_commit_sha)
    }

    /// Name of the check run reporting on this backport.
    pub fn check_run_name(&self) -> String {
        format!("Backport to {}", self.target_branch)
    }

    /// Commit the check run is attached to. PRs only show checks from the
    /// PR head, so the merge commit is not used here.
    pub fn check_run_head(&self) -> &str {
        self.head_sha.as_deref().unwrap_or(&self.head_ref)
    }

    /// Prefix of the temporary clone directory.
    pub fn clone_dir_prefix(&self) -> String {
        format!(
            "{}---{}---",
            path_component(&self.repo_slug),
            path_component(&self.target_branch)
        )
    }

    /// Suffix of the temporary clone directory.
    pub fn clone_dir_suffix(&self) -> String {
        format!("---PR-{}.git", self.pr_number)
    }

    /// Request for the follow-up pull request opened from `branch`.
    pub fn backport_pr(&self, branch: &BackportBranchName) -> CreatePrRequest {
        CreatePrRequest {
            title: format!(
                "[PR #{}/{} backport][{}] {}",
                self.pr_number,
                self.short_sha(),
                self.target_branch,
                self.pr_title
            ),
            body: format!(
                "**This is a backport of PR #{} as merged into {} ({}).**\n\n{}",
                self.pr_number,
                self.base_ref,
                self.merge_commit_sha,
                self.pr_body
            ),
            head_branch: branch.to_string(),
            base_branch: self.target_branch.clone(),
            maintainer_can_modify: true,
            draft: false,
        }
    }
}

fn path_component(value: &str) -> String {
    value.replace('/', "--")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{TEST_MERGE_SHA, create_test_request};

    #[test]
    fn branch_name_follows_convention() {
        let req = create_test_request(42, "v1.2");
        assert_eq!(
            req.branch_name().as_str(),
            format!("backports/v1.2/{TEST_MERGE_SHA}/pr42")
        );
    }

    #[test]
    fn branch_name_is_deterministic() {
        let req = create_test_request(42, "v1.2");
        assert_eq!(req.branch_name(), req.clone().branch_name());
    }

    #[test]
    fn branch_name_separates_distinct_triples() {
        let sha_a = "a".repeat(40);
        let sha_b = "b".repeat(40);
        let names = [
            BackportBranchName::new("v1.2", &sha_a, 4),
            BackportBranchName::new("v1.2", &sha_a, 42),
            BackportBranchName::new("v1.2", &sha_b, 4),
            BackportBranchName::new("v1.3", &sha_a, 4),
            BackportBranchName::new("release/1.x", &sha_a, 4),
            BackportBranchName::new("release", &sha_a, 4),
        ];

        for (i, left) in names.iter().enumerate() {
            for right in names.iter().skip(i + 1) {
                assert_ne!(left, right);
            }
        }
    }

    #[test]
    fn pr_title_embeds_short_sha_and_target() {
        let req = create_test_request(42, "v1.2");
        let pr = req.backport_pr(&req.branch_name());

        assert_eq!(
            pr.title,
            format!("[PR #42/{} backport][v1.2] Fix the widget", &TEST_MERGE_SHA[..8])
        );
        assert_eq!(pr.base_branch, "v1.2");
        assert_eq!(pr.head_branch, req.branch_name().to_string());
        assert!(pr.maintainer_can_modify);
        assert!(!pr.draft);
    }

    #[test]
    fn pr_body_starts_with_provenance() {
        let req = create_test_request(42, "v1.2");
        let pr = req.backport_pr(&req.branch_name());

        assert_eq!(
            pr.body,
            format!(
                "**This is a backport of PR #42 as merged into main ({TEST_MERGE_SHA}).**\n\nWidget was broken."
            )
        );
    }

    #[test]
    fn short_sha_tolerates_short_input() {
        let mut req = create_test_request(1, "v1.2");
        req.merge_commit_sha = "abc".into();
        assert_eq!(req.short_sha(), "abc");
    }

    #[test]
    fn clone_dir_names_are_path_safe() {
        let mut req = create_test_request(7, "release/1.x");
        req.repo_slug = "octo/widgets".into();
        assert_eq!(req.clone_dir_prefix(), "octo--widgets---release--1.x---");
        assert_eq!(req.clone_dir_suffix(), "---PR-7.git");
    }

    #[test]
    fn check_run_prefers_head_sha() {
        let mut req = create_test_request(7, "v1.2");
        assert_eq!(req.check_run_name(), "Backport to v1.2");
        assert_eq!(req.check_run_head(), req.head_sha.clone().unwrap());

        req.head_sha = None;
        assert_eq!(req.check_run_head(), "feature/widget");
    }
}
