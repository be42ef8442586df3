//! In-memory fake of [`WorkflowProvider`] (testing only)
//!
//! `ScriptedProvider` replays a queue of scripted listings and counts every
//! call, so poll-loop behaviour can be asserted without a network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::credentials::Credential;
use crate::error::{ActionError, Result};
use crate::input::{DispatchRequest, WorkflowTarget};
use crate::provider::{DispatchResponse, WorkflowProvider};
use crate::run::{Conclusion, RunStatus, WorkflowRun};

/// Build a run snapshot with a predictable `html_url`.
pub fn run(id: u64, name: &str, status: &str, conclusion: Option<&str>) -> WorkflowRun {
    WorkflowRun {
        id,
        name: Some(name.to_string()),
        status: RunStatus::from(status.to_string()),
        conclusion: conclusion.map(|c| Conclusion::from(c.to_string())),
        html_url: format!("https://github.com/acme/app/actions/runs/{}", id),
        run_number: Some(id),
        created_at: None,
    }
}

/// Scripted provider.
///
/// Listings are served in order; the last successful listing repeats once the
/// script runs out. Dispatch answers with the configured status (204 by
/// default) or a one-shot error.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    dispatch_status: Option<u16>,
    dispatch_error: Mutex<Option<ActionError>>,
    listings: Mutex<VecDeque<Result<Vec<WorkflowRun>>>>,
    list_delay: Option<Duration>,
    dispatched: Mutex<Vec<DispatchRequest>>,
    dispatch_calls: AtomicUsize,
    list_calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dispatch_status(mut self, status: u16) -> Self {
        self.dispatch_status = Some(status);
        self
    }

    pub fn with_dispatch_error(self, error: ActionError) -> Self {
        if let Ok(mut slot) = self.dispatch_error.lock() {
            *slot = Some(error);
        }
        self
    }

    pub fn with_listing(self, runs: Vec<WorkflowRun>) -> Self {
        if let Ok(mut listings) = self.listings.lock() {
            listings.push_back(Ok(runs));
        }
        self
    }

    pub fn with_list_error(self, error: ActionError) -> Self {
        if let Ok(mut listings) = self.listings.lock() {
            listings.push_back(Err(error));
        }
        self
    }

    /// Make every listing take `delay` before answering.
    pub fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = Some(delay);
        self
    }

    pub fn dispatch_calls(&self) -> usize {
        self.dispatch_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn dispatched_requests(&self) -> Vec<DispatchRequest> {
        self.dispatched
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl WorkflowProvider for ScriptedProvider {
    async fn dispatch(
        &self,
        request: &DispatchRequest,
        _credential: &Credential,
    ) -> Result<DispatchResponse> {
        self.dispatch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.dispatch_error.lock().ok().and_then(|mut e| e.take()) {
            return Err(error);
        }
        if let Ok(mut dispatched) = self.dispatched.lock() {
            dispatched.push(request.clone());
        }
        Ok(DispatchResponse {
            status: self.dispatch_status.unwrap_or(204),
        })
    }

    async fn list_runs(
        &self,
        _target: &WorkflowTarget,
        _credential: &Credential,
    ) -> Result<Vec<WorkflowRun>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }
        let mut listings = self.listings.lock().unwrap_or_else(|e| e.into_inner());
        if listings.len() == 1 {
            if let Some(Ok(runs)) = listings.front() {
                return Ok(runs.clone());
            }
        }
        listings.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}
