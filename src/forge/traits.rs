//! Traits related to the remote hosting platform
use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use crate::{
    Result,
    forge::request::{
        CheckRun, CreateCheckRunRequest, CreatePrRequest, PullRequest,
        UpdateCheckRunRequest,
    },
};

/// Hosting API operations the backport flow depends on.
///
/// Implementations map installation-scope denials onto
/// [`crate::PatchbackError::PermissionDenied`] and rejected payloads onto
/// [`crate::PatchbackError::ValidationFailed`]; every other error is
/// unclassified.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait HostingApi: Send + Sync {
    async fn create_check_run(
        &self,
        repo_slug: &str,
        req: CreateCheckRunRequest,
    ) -> Result<CheckRun>;

    async fn update_check_run(
        &self,
        repo_slug: &str,
        check_run_id: u64,
        req: UpdateCheckRunRequest,
    ) -> Result<()>;

    async fn create_pull_request(
        &self,
        pulls_url: &str,
        req: CreatePrRequest,
    ) -> Result<PullRequest>;
}
