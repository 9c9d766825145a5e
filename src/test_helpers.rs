//! Common test helper functions shared across test modules.
//!
//! Provides reusable fixtures for requests, webhook events and credentials
//! so individual test suites only spell out what they care about.
use secrecy::SecretString;

use crate::{
    forge::token::InstallationToken,
    gate::{
        LabelPayload, PullRequestEvent, PullRequestPayload, RefPayload,
        RepositoryPayload,
    },
    request::BackportRequest,
};

/// Merge commit used by fixtures that never touch a real repository.
pub const TEST_MERGE_SHA: &str = "0123456789abcdef0123456789abcdef01234567";
/// Head commit of the fixture pull request.
pub const TEST_HEAD_SHA: &str = "fedcba9876543210fedcba9876543210fedcba98";
pub const TEST_REPO_SLUG: &str = "octo/widgets";
pub const TEST_CLONE_URL: &str = "https://github.com/octo/widgets.git";
pub const TEST_PULLS_URL: &str =
    "https://api.github.com/repos/octo/widgets/pulls{/number}";

/// Creates a BackportRequest for PR `pr_number` targeting `target_branch`.
///
/// # Example
/// ```ignore
/// let req = create_test_request(42, "v1.2");
/// assert_eq!(req.check_run_name(), "Backport to v1.2");
/// ```
pub fn create_test_request(pr_number: u64, target_branch: &str) -> BackportRequest {
    BackportRequest {
        pr_number,
        pr_title: "Fix the widget".into(),
        pr_body: "Widget was broken.".into(),
        base_ref: "main".into(),
        head_ref: "feature/widget".into(),
        head_sha: Some(TEST_HEAD_SHA.into()),
        merge_commit_sha: TEST_MERGE_SHA.into(),
        target_branch: target_branch.into(),
        repo_slug: TEST_REPO_SLUG.into(),
        clone_url: TEST_CLONE_URL.into(),
        pulls_api_url: TEST_PULLS_URL.into(),
    }
}

/// Creates a `pull_request` webhook event.
///
/// # Arguments
/// * `action` - Webhook action, e.g. "closed" or "labeled"
/// * `number` - Pull request number
/// * `merged` - Whether the pull request is merged
/// * `labels` - Labels currently on the pull request
/// * `label` - Label that triggered a "labeled" event
pub fn create_test_event(
    action: &str,
    number: u64,
    merged: bool,
    labels: &[&str],
    label: Option<&str>,
) -> PullRequestEvent {
    PullRequestEvent {
        action: action.into(),
        number,
        pull_request: PullRequestPayload {
            merged,
            merge_commit_sha: Some(TEST_MERGE_SHA.into()),
            title: "Fix the widget".into(),
            body: Some("Widget was broken.".into()),
            base: RefPayload {
                ref_name: "main".into(),
                sha: None,
            },
            head: RefPayload {
                ref_name: "feature/widget".into(),
                sha: Some(TEST_HEAD_SHA.into()),
            },
            labels: labels
                .iter()
                .map(|name| LabelPayload {
                    name: name.to_string(),
                })
                .collect(),
        },
        repository: RepositoryPayload {
            full_name: TEST_REPO_SLUG.into(),
            clone_url: TEST_CLONE_URL.into(),
            pulls_url: TEST_PULLS_URL.into(),
        },
        label: label.map(|name| LabelPayload { name: name.into() }),
    }
}

/// Creates an installation token without expiry.
pub fn create_test_token() -> InstallationToken {
    InstallationToken::new(SecretString::from("test-token".to_string()), None)
}
