//! Drives admitted backport requests through check run reporting, the git
//! executor and pull request creation.
use derive_builder::Builder;
use futures_util::future::join_all;
use log::*;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::{
    PatchbackError, Result,
    backport::Backporter,
    config::{DEFAULT_LABEL_PREFIX, DEFAULT_MAX_CONCURRENT_BACKPORTS},
    forge::{
        request::{CheckRunOutput, PullRequest},
        token::{InstallationToken, TokenProvider},
        traits::HostingApi,
    },
    gate::{EventGate, PullRequestEvent},
    outcome::{BackportFailure, Outcome},
    request::{BackportBranchName, BackportRequest},
    status::{CheckRunState, StatusReporter},
};

const PR_BRANCH_CREATED_TEXT: &str =
    "PR branch created, proceeding with making a PR.";
const UNEXPECTED_FAILURE_SUMMARY: &str =
    "The backport stopped on an unexpected error. It has been reported to the operators.";

/// What happened to one (pull request, target branch) pair.
#[derive(Debug)]
pub struct BackportReport {
    pub request: BackportRequest,
    /// Set once the backport branch exists on the remote.
    pub branch: Option<BackportBranchName>,
    pub outcome: Outcome<PullRequest>,
    pub check_run: CheckRunState,
}

#[derive(Builder)]
#[builder(setter(into), build_fn(private, name = "_build"))]
pub struct OrchestratorParams {
    pub api: Arc<dyn HostingApi>,
    pub tokens: Arc<dyn TokenProvider>,
    pub backporter: Arc<dyn Backporter>,
    #[builder(default = "DEFAULT_LABEL_PREFIX.to_string()")]
    pub label_prefix: String,
    #[builder(default = "DEFAULT_MAX_CONCURRENT_BACKPORTS")]
    pub max_concurrent_backports: usize,
}

impl OrchestratorParamsBuilder {
    pub fn build(&self) -> Result<Orchestrator> {
        let params = self._build().map_err(|e| {
            PatchbackError::invalid_config(format!(
                "Failed to build backport orchestrator: {}",
                e
            ))
        })?;
        Orchestrator::new(params)
    }
}

pub struct Orchestrator {
    api: Arc<dyn HostingApi>,
    tokens: Arc<dyn TokenProvider>,
    backporter: Arc<dyn Backporter>,
    gate: EventGate,
    /// Caps concurrent clone/cherry-pick/push jobs on the blocking pool.
    workers: Arc<Semaphore>,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorParamsBuilder {
        OrchestratorParamsBuilder::default()
    }

    pub fn new(params: OrchestratorParams) -> Result<Self> {
        if params.max_concurrent_backports == 0 {
            return Err(PatchbackError::invalid_config(
                "max_concurrent_backports must be at least 1",
            ));
        }

        Ok(Self {
            api: params.api,
            tokens: params.tokens,
            backporter: params.backporter,
            gate: EventGate::new(params.label_prefix),
            workers: Arc::new(Semaphore::new(params.max_concurrent_backports)),
        })
    }

    /// Backport `event` to every target branch it names.
    ///
    /// Branches are processed concurrently and independently: every one
    /// runs to completion before the first unexpected error, if any, is
    /// returned.
    pub async fn handle_event(
        &self,
        event: &PullRequestEvent,
    ) -> Result<Vec<BackportReport>> {
        let requests = self.gate.admit(event)?;

        if requests.is_empty() {
            return Ok(vec![]);
        }

        info!(
            "processing {} backport(s) of PR#{}",
            requests.len(),
            event.number
        );

        let results =
            join_all(requests.into_iter().map(|req| self.process(req))).await;

        results.into_iter().collect()
    }

    /// Run one backport request end to end.
    ///
    /// Classified failures end up in the report. Anything else concludes
    /// the check run as neutral, when possible, and is returned as an
    /// error. The neutral summary names the backport PR if it was already
    /// opened.
    pub async fn process(&self, req: BackportRequest) -> Result<BackportReport> {
        let mut reporter = StatusReporter::new(Arc::clone(&self.api), &req);
        let mut created = None;

        match self.run(&req, &mut reporter, &mut created).await {
            Ok(outcome) => {
                let branch = match &outcome {
                    Ok(_) => Some(req.branch_name()),
                    Err(failure) if failure.branch_pushed() => {
                        Some(req.branch_name())
                    }
                    Err(_) => None,
                };

                Ok(BackportReport {
                    request: req,
                    branch,
                    outcome,
                    check_run: reporter.state(),
                })
            }
            Err(err) => {
                error!(
                    "backport of PR#{} to {} failed unexpectedly: {err}",
                    req.pr_number, req.target_branch
                );

                let summary = match &created {
                    Some(pr) => format!(
                        "Backport PR {} was created, but reporting it failed.\n\n{UNEXPECTED_FAILURE_SUMMARY}",
                        pr.html_url
                    ),
                    None => UNEXPECTED_FAILURE_SUMMARY.into(),
                };
                let output = CheckRunOutput {
                    title: format!(
                        "{}: backport failed unexpectedly",
                        reporter.name()
                    ),
                    summary,
                    text: String::new(),
                };
                if let Err(report_err) = reporter.neutral(output).await {
                    warn!(
                        "could not conclude check run {}: {report_err}",
                        reporter.name()
                    );
                }

                Err(err)
            }
        }
    }

    async fn run(
        &self,
        req: &BackportRequest,
        reporter: &mut StatusReporter,
        created: &mut Option<PullRequest>,
    ) -> Result<Outcome<PullRequest>> {
        reporter.start().await?;
        let name = reporter.name().to_string();

        let token = self.tokens.installation_token().await?;

        let branch = match self.execute(req, token).await? {
            Ok(branch) => branch,
            Err(failure) => {
                return self.conclude_failure(req, reporter, failure).await;
            }
        };

        reporter
            .progress(CheckRunOutput {
                title: format!("{name}: cherry-pick succeeded"),
                summary: branch_summary(&branch),
                text: PR_BRANCH_CREATED_TEXT.into(),
            })
            .await?;

        let pr = match self.open_pull_request(req, &branch).await? {
            Ok(pr) => pr,
            Err(failure) => {
                return self.conclude_failure(req, reporter, failure).await;
            }
        };

        info!(
            "backported PR#{} to {} as {}",
            req.pr_number, req.target_branch, pr.html_url
        );
        *created = Some(pr.clone());

        reporter
            .succeed(CheckRunOutput {
                title: format!("{name}: backport PR created"),
                summary: branch_summary(&branch),
                text: format!("Backported as {}", pr.html_url),
            })
            .await?;

        Ok(Ok(pr))
    }

    /// Run the executor on the blocking pool, waiting for a free worker
    /// first.
    async fn execute(
        &self,
        req: &BackportRequest,
        token: InstallationToken,
    ) -> Result<Outcome<BackportBranchName>> {
        let permit = Arc::clone(&self.workers)
            .acquire_owned()
            .await
            .map_err(|e| PatchbackError::WorkerError(e.to_string()))?;

        let backporter = Arc::clone(&self.backporter);
        let req = req.clone();

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            backporter.backport(&req, &token)
        })
        .await?
    }

    async fn open_pull_request(
        &self,
        req: &BackportRequest,
        branch: &BackportBranchName,
    ) -> Result<Outcome<PullRequest>> {
        let pr = req.backport_pr(branch);
        debug!("opening backport PR: {}", pr.title);

        match self.api.create_pull_request(&req.pulls_api_url, pr).await {
            Ok(pr) => Ok(Ok(pr)),
            Err(PatchbackError::ValidationFailed(msg)) => {
                Ok(Err(BackportFailure::PrValidationFailed(msg)))
            }
            Err(PatchbackError::PermissionDenied(msg)) => {
                Ok(Err(BackportFailure::PrPermissionDenied(msg)))
            }
            Err(err) => Err(err),
        }
    }

    async fn conclude_failure<T>(
        &self,
        req: &BackportRequest,
        reporter: &mut StatusReporter,
        failure: BackportFailure,
    ) -> Result<Outcome<T>> {
        info!(
            "backport of PR#{} to {} did not go through: {failure}",
            req.pr_number, req.target_branch
        );

        let summary = if failure.branch_pushed() {
            format!("{}\n\n{failure}", branch_summary(&req.branch_name()))
        } else {
            failure.to_string()
        };

        let output = CheckRunOutput {
            title: format!("{}: {}", reporter.name(), failure.headline()),
            summary,
            text: String::new(),
        };
        reporter.neutral(output).await?;

        Ok(Err(failure))
    }
}

fn branch_summary(branch: &BackportBranchName) -> String {
    format!("Backport PR branch: `{branch}`")
}
