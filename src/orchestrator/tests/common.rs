//! Common test utilities for orchestrator tests.

use std::sync::{Arc, Mutex};

use crate::{
    backport::{Backporter, MockBackporter},
    forge::{
        request::{CheckRun, PullRequest, UpdateCheckRunRequest},
        token::{MockTokenProvider, TokenProvider},
        traits::{HostingApi, MockHostingApi},
    },
    orchestrator::Orchestrator,
    test_helpers::create_test_token,
};

pub use crate::test_helpers::{
    TEST_CLONE_URL, TEST_MERGE_SHA, create_test_event, create_test_request,
};

/// Check run id handed out for every target branch except `v1.3`.
pub const TEST_CHECK_RUN_ID: u64 = 11;
/// Check run id handed out for `v1.3` in fan-out tests.
pub const SECOND_CHECK_RUN_ID: u64 = 13;

/// Every check run update seen by the mock, with its check run id.
pub type RecordedUpdates = Arc<Mutex<Vec<(u64, UpdateCheckRunRequest)>>>;

/// Creates a test Orchestrator from mocks.
///
/// # Example
/// ```ignore
/// let mut api = MockHostingApi::new();
/// let updates = record_check_runs(&mut api);
/// let orchestrator = create_test_orchestrator(api, backporter_returning_branch());
/// ```
pub fn create_test_orchestrator(
    api: MockHostingApi,
    backporter: MockBackporter,
) -> Orchestrator {
    let mut tokens = MockTokenProvider::new();
    tokens
        .expect_installation_token()
        .returning(|| Ok(create_test_token()));

    Orchestrator::builder()
        .api(Arc::new(api) as Arc<dyn HostingApi>)
        .tokens(Arc::new(tokens) as Arc<dyn TokenProvider>)
        .backporter(Arc::new(backporter) as Arc<dyn Backporter>)
        .max_concurrent_backports(2usize)
        .build()
        .unwrap()
}

/// Accept check run creation and record every update.
pub fn record_check_runs(api: &mut MockHostingApi) -> RecordedUpdates {
    api.expect_create_check_run().returning(|_, req| {
        let id = if req.name.ends_with("v1.3") {
            SECOND_CHECK_RUN_ID
        } else {
            TEST_CHECK_RUN_ID
        };
        Ok(CheckRun { id })
    });

    let updates = RecordedUpdates::default();
    let recorded = Arc::clone(&updates);
    api.expect_update_check_run().returning(move |_, id, req| {
        recorded.lock().unwrap().push((id, req));
        Ok(())
    });

    updates
}

/// Updates recorded for one check run, in order.
pub fn updates_for(
    updates: &RecordedUpdates,
    check_run_id: u64,
) -> Vec<UpdateCheckRunRequest> {
    updates
        .lock()
        .unwrap()
        .iter()
        .filter(|(id, _)| *id == check_run_id)
        .map(|(_, req)| req.clone())
        .collect()
}

/// Backporter pushing the deterministic branch for every request.
pub fn backporter_returning_branch() -> MockBackporter {
    let mut backporter = MockBackporter::new();
    backporter
        .expect_backport()
        .returning(|req, _| Ok(Ok(req.branch_name())));
    backporter
}

pub fn test_pull_request(number: u64) -> PullRequest {
    PullRequest {
        number,
        html_url: format!("https://github.com/octo/widgets/pull/{number}"),
    }
}
