//! Implements the HostingApi trait for Github
use async_trait::async_trait;
use log::*;
use octocrab::Octocrab;
use regex::Regex;
use std::sync::LazyLock;

use crate::{
    Result,
    forge::{
        config::RemoteConfig,
        request::{
            CheckRun, CreateCheckRunRequest, CreatePrRequest, PullRequest,
            UpdateCheckRunRequest,
        },
        traits::HostingApi,
    },
};

static URI_TEMPLATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^}]*\}").unwrap());

/// Drop RFC 6570 template segments from hypermedia URLs found in webhook
/// payloads, e.g. `.../pulls{/number}` becomes `.../pulls`.
pub fn expand_collection_url(url: &str) -> String {
    URI_TEMPLATE_REGEX.replace_all(url, "").to_string()
}

/// GitHub hosting API implementation using Octocrab for check runs and
/// pull requests.
pub struct Github {
    base_uri: String,
    instance: Octocrab,
}

impl Github {
    /// Create GitHub client with installation token authentication and API
    /// base URL configuration.
    pub fn new(config: RemoteConfig) -> Result<Self> {
        let base_uri = config.api_base_uri.trim_end_matches('/').to_string();
        let instance = Octocrab::builder()
            .personal_token(config.token.clone())
            .base_uri(base_uri.clone())?
            .build()?;

        Ok(Self { base_uri, instance })
    }
}

#[async_trait]
impl HostingApi for Github {
    async fn create_check_run(
        &self,
        repo_slug: &str,
        req: CreateCheckRunRequest,
    ) -> Result<CheckRun> {
        let endpoint =
            format!("{}/repos/{}/check-runs", self.base_uri, repo_slug);

        let body = serde_json::json!(req);

        debug!("creating check run {} on {}", req.name, req.head_sha);

        let check_run: CheckRun =
            self.instance.post(endpoint, Some(&body)).await?;

        info!("created check run {} for {repo_slug}", check_run.id);

        Ok(check_run)
    }

    async fn update_check_run(
        &self,
        repo_slug: &str,
        check_run_id: u64,
        req: UpdateCheckRunRequest,
    ) -> Result<()> {
        let endpoint = format!(
            "{}/repos/{}/check-runs/{}",
            self.base_uri, repo_slug, check_run_id
        );

        let body = serde_json::json!(req);

        debug!("updating check run {check_run_id}: status: {}", req.status);

        let _: serde_json::Value =
            self.instance.patch(endpoint, Some(&body)).await?;

        Ok(())
    }

    async fn create_pull_request(
        &self,
        pulls_url: &str,
        req: CreatePrRequest,
    ) -> Result<PullRequest> {
        let endpoint = expand_collection_url(pulls_url);

        let body = serde_json::json!({
          "title": req.title,
          "head": req.head_branch,
          "base": req.base_branch,
          "body": req.body,
          "maintainer_can_modify": req.maintainer_can_modify,
          "draft": req.draft,
        });

        let pr: PullRequest = self.instance.post(endpoint, Some(&body)).await?;

        info!("created a PR @ {}", pr.html_url);

        Ok(pr)
    }
}
