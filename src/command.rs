//! Execution of CLI subcommands.
use log::*;
use serde::Serialize;
use std::{path::Path, sync::Arc};

use crate::{
    Result,
    backport::{Backporter, GitBackporter},
    cli::{Args, Command},
    config::Config,
    forge::{
        config::RemoteConfig,
        github::Github,
        token::{StaticTokenProvider, TokenProvider},
        traits::HostingApi,
    },
    gate::PullRequestEvent,
    orchestrator::{BackportReport, Orchestrator},
};

/// One line of the report printed after handling an event.
#[derive(Debug, Serialize)]
pub struct ReportLine {
    pub target_branch: String,
    pub branch: Option<String>,
    pub pull_request: Option<String>,
    pub failure: Option<String>,
}

impl From<&BackportReport> for ReportLine {
    fn from(report: &BackportReport) -> Self {
        let (pull_request, failure) = match &report.outcome {
            Ok(pr) => (Some(pr.html_url.clone()), None),
            Err(failure) => (None, Some(failure.to_string())),
        };

        Self {
            target_branch: report.request.target_branch.clone(),
            branch: report.branch.as_ref().map(|b| b.to_string()),
            pull_request,
            failure,
        }
    }
}

pub async fn execute(args: &Args) -> Result<()> {
    match &args.command {
        Command::Handle { event, payload } => {
            let lines = handle(args, event, payload).await?;
            println!("{}", serde_json::to_string_pretty(&lines)?);
            Ok(())
        }
    }
}

/// Run a stored webhook delivery through the gate and the orchestrator.
pub async fn handle(
    args: &Args,
    event_name: &str,
    payload: &Path,
) -> Result<Vec<ReportLine>> {
    let config = Config::load(&args.config).await?;
    let token = args.installation_token()?;

    let body = tokio::fs::read_to_string(payload).await?;
    let Some(event) = PullRequestEvent::parse(event_name, &body)? else {
        info!("nothing to do for {event_name} events");
        return Ok(vec![]);
    };

    let api = Github::new(RemoteConfig {
        api_base_uri: config.api_base_uri.clone(),
        token: token.secret().clone(),
    })?;

    let backporter =
        GitBackporter::new(config.committer.clone(), config.conflict_policy);

    let orchestrator = Orchestrator::builder()
        .api(Arc::new(api) as Arc<dyn HostingApi>)
        .tokens(Arc::new(StaticTokenProvider::new(token)) as Arc<dyn TokenProvider>)
        .backporter(Arc::new(backporter) as Arc<dyn Backporter>)
        .label_prefix(config.label_prefix.clone())
        .max_concurrent_backports(config.max_concurrent_backports)
        .build()?;

    let reports = orchestrator.handle_event(&event).await?;

    for report in reports.iter() {
        match &report.outcome {
            Ok(pr) => info!(
                "PR#{} backported to {}: {}",
                report.request.pr_number, report.request.target_branch, pr.html_url
            ),
            Err(failure) => warn!(
                "PR#{} not backported to {}: {failure}",
                report.request.pr_number, report.request.target_branch
            ),
        }
    }

    Ok(reports.iter().map(ReportLine::from).collect())
}
