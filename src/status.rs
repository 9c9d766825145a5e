//! Check run lifecycle for a single backport request.
//!
//! ```text
//! absent -> queued -> in_progress -> completed(success | neutral)
//!    \
//!     -> disabled
//! ```
//!
//! Reporting is best-effort: when the installation is not allowed to manage
//! check runs the reporter switches to `disabled` and every later call is a
//! no-op, so the backport itself carries on unaffected.
use chrono::Utc;
use log::*;
use std::sync::Arc;

use crate::{
    PatchbackError, Result,
    forge::{
        request::{
            CheckRunConclusion, CheckRunOutput, CheckRunStatus,
            CreateCheckRunRequest, UpdateCheckRunRequest,
        },
        traits::HostingApi,
    },
    request::BackportRequest,
};

/// Local view of the remote check run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckRunState {
    Absent,
    Queued,
    InProgress,
    Completed(CheckRunConclusion),
    Disabled,
}

pub struct StatusReporter {
    api: Arc<dyn HostingApi>,
    repo_slug: String,
    name: String,
    head_sha: String,
    check_run_id: Option<u64>,
    state: CheckRunState,
}

impl StatusReporter {
    pub fn new(api: Arc<dyn HostingApi>, req: &BackportRequest) -> Self {
        Self {
            api,
            repo_slug: req.repo_slug.clone(),
            name: req.check_run_name(),
            head_sha: req.check_run_head().to_string(),
            check_run_id: None,
            state: CheckRunState::Absent,
        }
    }

    pub fn state(&self) -> CheckRunState {
        self.state
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Create the check run as `queued`, then move it to `in_progress`.
    pub async fn start(&mut self) -> Result<()> {
        if self.state != CheckRunState::Absent {
            warn!("check run {} was already started", self.name);
            return Ok(());
        }

        let created = self
            .api
            .create_check_run(
                &self.repo_slug,
                CreateCheckRunRequest {
                    name: self.name.clone(),
                    head_sha: self.head_sha.clone(),
                    status: CheckRunStatus::Queued,
                    started_at: Utc::now(),
                },
            )
            .await;

        let check_run = match created {
            Ok(check_run) => check_run,
            Err(PatchbackError::PermissionDenied(msg)) => {
                self.disable(&msg);
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        debug!("created check run {} ({})", self.name, check_run.id);
        self.check_run_id = Some(check_run.id);
        self.state = CheckRunState::Queued;

        self.update(CheckRunStatus::InProgress, None, None).await
    }

    /// Annotate a milestone while staying `in_progress`.
    pub async fn progress(&mut self, output: CheckRunOutput) -> Result<()> {
        match self.state {
            CheckRunState::Disabled => Ok(()),
            CheckRunState::Queued | CheckRunState::InProgress => {
                self.update(CheckRunStatus::InProgress, None, Some(output))
                    .await
            }
            state => {
                warn!(
                    "ignoring progress for check run {} in state {state:?}",
                    self.name
                );
                Ok(())
            }
        }
    }

    pub async fn succeed(&mut self, output: CheckRunOutput) -> Result<()> {
        self.finish(CheckRunConclusion::Success, output).await
    }

    pub async fn neutral(&mut self, output: CheckRunOutput) -> Result<()> {
        self.finish(CheckRunConclusion::Neutral, output).await
    }

    /// The single terminal transition. Later calls are logged and ignored.
    async fn finish(
        &mut self,
        conclusion: CheckRunConclusion,
        output: CheckRunOutput,
    ) -> Result<()> {
        match self.state {
            CheckRunState::Disabled => Ok(()),
            CheckRunState::Queued | CheckRunState::InProgress => {
                self.update(CheckRunStatus::Completed, Some(conclusion), Some(output))
                    .await
            }
            state => {
                warn!(
                    "refusing to conclude check run {} as {conclusion} in state {state:?}",
                    self.name
                );
                Ok(())
            }
        }
    }

    async fn update(
        &mut self,
        status: CheckRunStatus,
        conclusion: Option<CheckRunConclusion>,
        output: Option<CheckRunOutput>,
    ) -> Result<()> {
        let Some(id) = self.check_run_id else {
            return Ok(());
        };

        let completed_at = conclusion.map(|_| Utc::now());
        let updated = self
            .api
            .update_check_run(
                &self.repo_slug,
                id,
                UpdateCheckRunRequest {
                    name: self.name.clone(),
                    status,
                    conclusion,
                    completed_at,
                    output,
                },
            )
            .await;

        match updated {
            Ok(()) => {
                self.state = match conclusion {
                    Some(conclusion) => CheckRunState::Completed(conclusion),
                    None => CheckRunState::InProgress,
                };
                Ok(())
            }
            Err(PatchbackError::PermissionDenied(msg)) => {
                self.disable(&msg);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn disable(&mut self, reason: &str) {
        warn!(
            "check run reporting for {} disabled: insufficient permissions: {reason}",
            self.name
        );
        self.state = CheckRunState::Disabled;
    }
}
