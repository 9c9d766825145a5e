//! Admission filter turning webhook payloads into backport requests.
//!
//! Only two shapes get through, and both require the pull request to be
//! merged:
//!
//! - `pull_request` / `closed` with one or more backport labels: one
//!   request per label
//! - `pull_request` / `labeled` with a backport label: exactly one request
//!
//! Everything else is dropped without side effects.
use log::*;
use serde::Deserialize;

use crate::{PatchbackError, Result, request::BackportRequest};

/// Webhook event name carrying pull request activity.
pub const PULL_REQUEST_EVENT: &str = "pull_request";

#[derive(Debug, Clone, Deserialize)]
pub struct LabelPayload {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefPayload {
    #[serde(rename = "ref")]
    pub ref_name: String,
    #[serde(default)]
    pub sha: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestPayload {
    #[serde(default)]
    pub merged: bool,
    #[serde(default)]
    pub merge_commit_sha: Option<String>,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub base: RefPayload,
    pub head: RefPayload,
    #[serde(default)]
    pub labels: Vec<LabelPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryPayload {
    pub full_name: String,
    pub clone_url: String,
    pub pulls_url: String,
}

/// The fields of a `pull_request` webhook payload the backport flow reads.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestEvent {
    pub action: String,
    pub number: u64,
    pub pull_request: PullRequestPayload,
    pub repository: RepositoryPayload,
    #[serde(default)]
    pub label: Option<LabelPayload>,
}

impl PullRequestEvent {
    /// Parse a raw webhook body. Returns `None` for events other than
    /// `pull_request`.
    pub fn parse(event_name: &str, body: &str) -> Result<Option<Self>> {
        if event_name != PULL_REQUEST_EVENT {
            debug!("ignoring {event_name} event");
            return Ok(None);
        }

        let event = serde_json::from_str(body).map_err(|err| {
            PatchbackError::invalid_payload(format!(
                "malformed {event_name} payload: {err}"
            ))
        })?;

        Ok(Some(event))
    }
}

/// Precondition filter in front of the backport orchestrator.
#[derive(Debug, Clone)]
pub struct EventGate {
    label_prefix: String,
}

impl EventGate {
    pub fn new(label_prefix: impl Into<String>) -> Self {
        Self {
            label_prefix: label_prefix.into(),
        }
    }

    /// Target branch named by `label`, if it is a backport label.
    pub fn target_branch<'a>(&self, label: &'a str) -> Option<&'a str> {
        label
            .strip_prefix(&self.label_prefix)
            .filter(|branch| !branch.is_empty())
    }

    /// Turn an event into zero or more backport requests.
    ///
    /// Returns an error only when a qualifying event is missing data the
    /// backport needs; non-qualifying events yield an empty list.
    pub fn admit(&self, event: &PullRequestEvent) -> Result<Vec<BackportRequest>> {
        let number = event.number;

        let target_branches: Vec<&str> = match event.action.as_str() {
            "closed" | "labeled" if !event.pull_request.merged => {
                info!("PR#{number} is not merged, ignoring...");
                return Ok(vec![]);
            }
            "closed" => {
                let labels = event
                    .pull_request
                    .labels
                    .iter()
                    .map(|l| l.name.as_str())
                    .collect::<Vec<&str>>();

                let branches = event
                    .pull_request
                    .labels
                    .iter()
                    .filter_map(|l| self.target_branch(&l.name))
                    .collect::<Vec<&str>>();

                if branches.is_empty() {
                    info!("PR#{number} does not have backport labels, ignoring...");
                    return Ok(vec![]);
                }

                info!(
                    "PR#{number} is labeled with {:?}. It needs to be backported to {}",
                    labels,
                    branches.join(", ")
                );

                branches
            }
            "labeled" => {
                let Some(label) = event.label.as_ref() else {
                    return Err(PatchbackError::invalid_payload(format!(
                        "labeled event for PR#{number} carries no label"
                    )));
                };

                let Some(branch) = self.target_branch(&label.name) else {
                    info!(
                        "PR#{number} got labeled with {} but it is not a backport label, ignoring...",
                        label.name
                    );
                    return Ok(vec![]);
                };

                info!(
                    "PR#{number} got labeled with {}. It needs to be backported to {branch}",
                    label.name
                );

                vec![branch]
            }
            action => {
                debug!("ignoring pull_request action {action} for PR#{number}");
                return Ok(vec![]);
            }
        };

        let merge_commit_sha = self.merge_commit_sha(event)?;
        info!("PR#{number} merge commit: {merge_commit_sha}");

        url::Url::parse(&event.repository.clone_url)?;

        Ok(target_branches
            .into_iter()
            .map(|target| build_request(event, &merge_commit_sha, target))
            .collect())
    }

    fn merge_commit_sha(&self, event: &PullRequestEvent) -> Result<String> {
        let sha = event
            .pull_request
            .merge_commit_sha
            .as_deref()
            .ok_or_else(|| {
                PatchbackError::invalid_payload(format!(
                    "merged PR#{} has no merge commit",
                    event.number
                ))
            })?;

        if sha.is_empty() || !sha.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(PatchbackError::invalid_payload(format!(
                "merge commit of PR#{} is not a commit id: {sha}",
                event.number
            )));
        }

        Ok(sha.to_lowercase())
    }
}

fn build_request(
    event: &PullRequestEvent,
    merge_commit_sha: &str,
    target_branch: &str,
) -> BackportRequest {
    let pr = &event.pull_request;
    BackportRequest {
        pr_number: event.number,
        pr_title: pr.title.clone(),
        pr_body: pr.body.clone().unwrap_or_default(),
        base_ref: pr.base.ref_name.clone(),
        head_ref: pr.head.ref_name.clone(),
        head_sha: pr.head.sha.clone(),
        merge_commit_sha: merge_commit_sha.to_string(),
        target_branch: target_branch.to_string(),
        repo_slug: event.repository.full_name.clone(),
        clone_url: event.repository.clone_url.clone(),
        pulls_api_url: event.repository.pulls_url.clone(),
    }
}
