//! The two CI provider operations the action relies on.
//!
//! `GithubClient` is the production implementation; `fakes::ScriptedProvider`
//! satisfies the same contract in memory for tests.

use async_trait::async_trait;

use crate::credentials::Credential;
use crate::error::Result;
use crate::input::{DispatchRequest, WorkflowTarget};
use crate::run::WorkflowRun;

/// HTTP-level answer to a dispatch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchResponse {
    pub status: u16,
}

impl DispatchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Workflow dispatch + run listing.
///
/// Contract:
/// - `dispatch` returns `Ok` for any HTTP response that is not an error
///   status; error statuses and transport failures are `Err`.
/// - `list_runs` returns runs most-recent-first, as the provider orders them.
#[async_trait]
pub trait WorkflowProvider: Send + Sync {
    /// `POST /repos/{owner}/{repo}/actions/workflows/{workflow}/dispatches`
    async fn dispatch(
        &self,
        request: &DispatchRequest,
        credential: &Credential,
    ) -> Result<DispatchResponse>;

    /// `GET /repos/{owner}/{repo}/actions/workflows/{workflow}/runs`
    async fn list_runs(
        &self,
        target: &WorkflowTarget,
        credential: &Credential,
    ) -> Result<Vec<WorkflowRun>>;
}
