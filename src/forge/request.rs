use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

/// Lifecycle status of a check run as understood by the hosting API.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CheckRunStatus {
    Queued,
    InProgress,
    Completed,
}

/// Final verdict of a completed check run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CheckRunConclusion {
    Success,
    Neutral,
}

/// Human readable check run details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckRunOutput {
    pub title: String,
    pub summary: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Request to create a check run.
pub struct CreateCheckRunRequest {
    pub name: String,
    pub head_sha: String,
    pub status: CheckRunStatus,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Request to update an existing check run.
pub struct UpdateCheckRunRequest {
    pub name: String,
    pub status: CheckRunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conclusion: Option<CheckRunConclusion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<CheckRunOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Request to create a new pull request.
pub struct CreatePrRequest {
    pub title: String,
    pub body: String,
    pub head_branch: String,
    pub base_branch: String,
    pub maintainer_can_modify: bool,
    pub draft: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
/// Pull request information returned by the hosting API.
pub struct PullRequest {
    pub number: u64,
    pub html_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
/// Identifier of a created check run.
pub struct CheckRun {
    pub id: u64,
}
