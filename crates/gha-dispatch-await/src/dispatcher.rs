//! Sends the workflow_dispatch request.

use crate::context::ActionLogger;
use crate::credentials::Credential;
use crate::error::Result;
use crate::input::{CorrelationToken, DispatchRequest};
use crate::obs;
use crate::provider::WorkflowProvider;

/// What the dispatcher learned from the API. GitHub returns no run id here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReceipt {
    /// Token to look for in the run's display name.
    pub token: CorrelationToken,
    pub status: u16,
    /// `false` when the API answered outside 2xx without an error status.
    pub accepted: bool,
}

/// Fires a single dispatch. The dispatch itself is never retried.
pub struct Dispatcher<'a, P: WorkflowProvider + ?Sized> {
    provider: &'a P,
}

impl<'a, P: WorkflowProvider + ?Sized> Dispatcher<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        Self { provider }
    }

    /// Validate the correlation token, then POST the dispatch.
    ///
    /// A missing or empty `trigger_event` fails before any network call.
    /// Error statuses and transport failures propagate; any other non-2xx
    /// status is logged and the caller proceeds to polling.
    pub async fn dispatch(
        &self,
        request: &DispatchRequest,
        credential: &Credential,
        logger: &dyn ActionLogger,
    ) -> Result<DispatchReceipt> {
        let token = request.correlation_token()?;
        let repo = request.target.slug();
        let workflow = request.target.workflow.to_string();

        logger.log_info(&format!(
            "Triggering workflow {} for repo {}",
            workflow, repo
        ));

        let response = self.provider.dispatch(request, credential).await?;

        if response.is_success() {
            obs::emit_dispatch_sent(&repo, &workflow, response.status);
            logger.log_info(&format!(
                "Workflow {} triggered successfully with status {}",
                workflow, response.status
            ));
        } else {
            obs::emit_dispatch_anomaly(&repo, &workflow, response.status);
            logger.log_error(&format!(
                "Successful response was not 2xx for {}. Response status was {}",
                workflow, response.status
            ));
        }

        Ok(DispatchReceipt {
            token,
            status: response.status,
            accepted: response.is_success(),
        })
    }
}
