//! Tests for classified failures.
//!
//! Tests for:
//! - Missing target branch concluding the check run as neutral
//! - Push denied for insufficient scope never opening a PR
//! - PR creation failures after the branch was pushed

use super::common::*;
use crate::{
    PatchbackError,
    backport::MockBackporter,
    error::INTEGRATION_FORBIDDEN_MESSAGE,
    forge::{
        request::{CheckRunConclusion, CheckRunStatus},
        traits::MockHostingApi,
    },
    outcome::BackportFailure,
    status::CheckRunState,
};

fn backporter_failing_with(failure: BackportFailure) -> MockBackporter {
    let mut backporter = MockBackporter::new();
    backporter
        .expect_backport()
        .times(1)
        .returning(move |_, _| Ok(Err(failure.clone())));
    backporter
}

#[tokio::test]
async fn missing_target_branch_concludes_neutral_without_pr() {
    let mut api = MockHostingApi::new();
    let updates = record_check_runs(&mut api);
    api.expect_create_pull_request().never();

    let orchestrator = create_test_orchestrator(
        api,
        backporter_failing_with(BackportFailure::TargetBranchMissing {
            branch: "v9.9".into(),
        }),
    );
    let event = create_test_event("closed", 42, true, &["backport-v9.9"], None);

    let reports = orchestrator.handle_event(&event).await.unwrap();

    assert_eq!(
        reports[0].outcome,
        Err(BackportFailure::TargetBranchMissing {
            branch: "v9.9".into()
        })
    );
    assert!(reports[0].branch.is_none());
    assert_eq!(
        reports[0].check_run,
        CheckRunState::Completed(CheckRunConclusion::Neutral)
    );

    let updates = updates_for(&updates, TEST_CHECK_RUN_ID);
    let completed = updates
        .iter()
        .filter(|u| u.status == CheckRunStatus::Completed)
        .collect::<Vec<_>>();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].conclusion, Some(CheckRunConclusion::Neutral));

    let output = completed[0].output.as_ref().unwrap();
    assert_eq!(
        output.title,
        "Backport to v9.9: cherry-picking failed — target branch does not exist"
    );
    assert!(output.summary.contains("v9.9"));
}

#[tokio::test]
async fn denied_push_never_opens_pr() {
    let mut api = MockHostingApi::new();
    let updates = record_check_runs(&mut api);
    api.expect_create_pull_request().never();

    let orchestrator = create_test_orchestrator(
        api,
        backporter_failing_with(BackportFailure::PushPermissionDenied {
            remote: TEST_CLONE_URL.into(),
        }),
    );

    let report = orchestrator
        .process(create_test_request(42, "v1.2"))
        .await
        .unwrap();

    assert!(matches!(
        report.outcome,
        Err(BackportFailure::PushPermissionDenied { .. })
    ));

    let updates = updates_for(&updates, TEST_CHECK_RUN_ID);
    let last = updates.last().unwrap();
    assert_eq!(last.conclusion, Some(CheckRunConclusion::Neutral));
    assert_eq!(
        last.output.as_ref().unwrap().title,
        "Backport to v1.2: cherry-picking failed — could not push"
    );
}

#[tokio::test]
async fn conflicting_backport_is_reported() {
    let mut api = MockHostingApi::new();
    let updates = record_check_runs(&mut api);
    api.expect_create_pull_request().never();

    let orchestrator = create_test_orchestrator(
        api,
        backporter_failing_with(BackportFailure::MergeConflict {
            paths: vec!["src/widget.rs".into()],
        }),
    );

    let report = orchestrator
        .process(create_test_request(42, "v1.2"))
        .await
        .unwrap();

    assert!(report.outcome.is_err());
    let updates = updates_for(&updates, TEST_CHECK_RUN_ID);
    let output = updates.last().unwrap().output.clone().unwrap();
    assert!(output.summary.contains("src/widget.rs"));
}

#[tokio::test]
async fn rejected_pr_concludes_neutral_with_branch() {
    let mut api = MockHostingApi::new();
    let updates = record_check_runs(&mut api);
    api.expect_create_pull_request().times(1).returning(|_, _| {
        Err(PatchbackError::validation_failed(
            "A pull request already exists for octo:backports/v1.2",
        ))
    });

    let orchestrator =
        create_test_orchestrator(api, backporter_returning_branch());

    let report = orchestrator
        .process(create_test_request(42, "v1.2"))
        .await
        .unwrap();

    assert!(matches!(
        report.outcome,
        Err(BackportFailure::PrValidationFailed(_))
    ));
    assert!(report.branch.is_some());

    let updates = updates_for(&updates, TEST_CHECK_RUN_ID);
    let last = updates.last().unwrap();
    assert_eq!(last.conclusion, Some(CheckRunConclusion::Neutral));

    let output = last.output.as_ref().unwrap();
    assert_eq!(
        output.title,
        "Backport to v1.2: creation of the backport PR failed"
    );
    assert!(output.summary.starts_with(&format!(
        "Backport PR branch: `backports/v1.2/{TEST_MERGE_SHA}/pr42`"
    )));
    assert!(output.summary.contains("A pull request already exists"));
}

#[tokio::test]
async fn pr_permission_denied_is_classified() {
    let mut api = MockHostingApi::new();
    record_check_runs(&mut api);
    api.expect_create_pull_request().times(1).returning(|_, _| {
        Err(PatchbackError::permission_denied(INTEGRATION_FORBIDDEN_MESSAGE))
    });

    let orchestrator =
        create_test_orchestrator(api, backporter_returning_branch());

    let report = orchestrator
        .process(create_test_request(42, "v1.2"))
        .await
        .unwrap();

    assert!(matches!(
        report.outcome,
        Err(BackportFailure::PrPermissionDenied(_))
    ));
    assert_eq!(
        report.check_run,
        CheckRunState::Completed(CheckRunConclusion::Neutral)
    );
}
