//! Run resolution and completion polling.
//!
//! The dispatch API does not return a run id, so every cycle lists the most
//! recent runs of the workflow and picks the first one whose display name
//! contains the correlation token. The loop moves through
//! `Searching → Tracking → Succeeded | Failed` and sleeps a fixed interval
//! between non-terminal cycles. A deadline and a cancellation token bound it;
//! the deadline also bounds in-flight listings and shortens the last sleep.
//! At least one listing is always attempted, even with a zero deadline.

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::PollConfig;
use crate::context::ActionLogger;
use crate::credentials::Credential;
use crate::error::{ActionError, Result};
use crate::input::{CorrelationToken, WorkflowTarget};
use crate::obs;
use crate::provider::WorkflowProvider;
use crate::run::{PollResult, RunStatus, WorkflowRun};

/// Conclusion reported when GitHub marks a run completed without one.
pub const MISSING_CONCLUSION: &str = "unknown";

/// First run, in provider order (most recent first), whose display name
/// contains the token.
pub fn resolve_run<'r>(runs: &'r [WorkflowRun], token: &CorrelationToken) -> Option<&'r WorkflowRun> {
    runs.iter().find(|run| token.matches(run.display_name()))
}

/// Where the wait currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    /// No listed run carries the token yet.
    Searching,
    /// A matching run exists but has not completed.
    Tracking {
        run_id: u64,
        html_url: String,
        status: RunStatus,
    },
    Succeeded(PollResult),
    Failed {
        conclusion: String,
        workflow_run_url: String,
    },
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PollState::Succeeded(_) | PollState::Failed { .. })
    }

    /// Apply the run matched in this cycle.
    ///
    /// Terminal states are absorbing. When nothing matches, the state is
    /// kept as is: a tracked run that drops out of the listing stays tracked.
    pub fn advance(self, matched: Option<&WorkflowRun>) -> PollState {
        if self.is_terminal() {
            return self;
        }
        let Some(run) = matched else {
            return self;
        };

        if !run.status.is_terminal() {
            return PollState::Tracking {
                run_id: run.id,
                html_url: run.html_url.clone(),
                status: run.status.clone(),
            };
        }

        match &run.conclusion {
            Some(conclusion) if conclusion.is_success() => PollState::Succeeded(PollResult {
                conclusion: conclusion.to_string(),
                workflow_run_url: run.html_url.clone(),
            }),
            other => PollState::Failed {
                conclusion: other
                    .as_ref()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| MISSING_CONCLUSION.to_string()),
                workflow_run_url: run.html_url.clone(),
            },
        }
    }
}

/// Polls the provider until the correlated run is terminal.
pub struct CompletionPoller<'a, P: WorkflowProvider + ?Sized> {
    provider: &'a P,
    config: &'a PollConfig,
}

impl<'a, P: WorkflowProvider + ?Sized> CompletionPoller<'a, P> {
    pub fn new(provider: &'a P, config: &'a PollConfig) -> Self {
        Self { provider, config }
    }

    /// Wait for the run whose display name contains `token`.
    ///
    /// Returns the success result, or fails with `WorkflowFailed`,
    /// `Timeout`, `Cancelled`, or a non-retryable listing error. Retryable
    /// listing errors are tolerated up to
    /// `max_consecutive_list_failures` in a row.
    pub async fn await_completion(
        &self,
        target: &WorkflowTarget,
        token: &CorrelationToken,
        credential: &Credential,
        logger: &dyn ActionLogger,
        cancel: &CancellationToken,
    ) -> Result<PollResult> {
        let started = Instant::now();
        let deadline = self.config.max_wait.map(|max_wait| started + max_wait);
        let mut state = PollState::Searching;
        let mut resolved_run: Option<u64> = None;
        let mut attempt: u32 = 0;
        let mut consecutive_failures: u32 = 0;

        loop {
            attempt += 1;

            // A listing still in flight at the deadline is abandoned.
            let list = self.provider.list_runs(target, credential);
            let bounded = async {
                match deadline {
                    Some(deadline) => tokio::time::timeout_at(deadline, list).await.ok(),
                    None => Some(list.await),
                }
            };
            let listing = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(token, logger)),
                listing = bounded => listing,
            };
            let Some(listing) = listing else {
                return Err(timed_out(token, started, logger));
            };

            match listing {
                Err(err)
                    if err.is_retryable()
                        && consecutive_failures < self.config.max_consecutive_list_failures =>
                {
                    consecutive_failures += 1;
                    obs::emit_list_failed(attempt, consecutive_failures, &err);
                    logger.log_error(&format!(
                        "Failed to list runs for workflow {} (attempt {}), retrying: {}",
                        target.workflow, attempt, err
                    ));
                }
                Err(err) => {
                    logger.log_error(&format!(
                        "Failed to list runs for workflow {}: {}",
                        target.workflow, err
                    ));
                    return Err(err);
                }
                Ok(runs) => {
                    consecutive_failures = 0;
                    let matched = resolve_run(&runs, token);

                    match matched {
                        Some(run) => {
                            if resolved_run != Some(run.id) {
                                resolved_run = Some(run.id);
                                obs::emit_run_resolved(run.id, &run.html_url);
                            }
                            obs::emit_run_polled(attempt, run.id, run.status.as_str());
                            logger.log_info(&format!(
                                "Checking status for workflow run {}",
                                run.html_url
                            ));
                        }
                        None => obs::emit_run_searching(attempt, runs.len()),
                    }

                    state = state.advance(matched);
                    match &state {
                        PollState::Succeeded(result) => {
                            obs::emit_run_finished(
                                &result.workflow_run_url,
                                &result.conclusion,
                                attempt,
                                started.elapsed(),
                            );
                            logger.log_info(&format!(
                                "Workflow completed successfully. Conclusion: {}",
                                result.conclusion
                            ));
                            return Ok(result.clone());
                        }
                        PollState::Failed {
                            conclusion,
                            workflow_run_url,
                        } => {
                            obs::emit_run_finished(
                                workflow_run_url,
                                conclusion,
                                attempt,
                                started.elapsed(),
                            );
                            logger.log_error(&format!(
                                "Workflow did not succeed. Conclusion: {}",
                                conclusion
                            ));
                            return Err(ActionError::WorkflowFailed {
                                conclusion: conclusion.clone(),
                                workflow_run_url: workflow_run_url.clone(),
                            });
                        }
                        PollState::Searching | PollState::Tracking { .. } => {}
                    }
                }
            }

            // The last sleep is cut short so the deadline is never overshot.
            let next_poll = Instant::now() + self.config.interval;
            let wake = match deadline {
                Some(deadline) if deadline <= Instant::now() => {
                    return Err(timed_out(token, started, logger));
                }
                Some(deadline) => next_poll.min(deadline),
                None => next_poll,
            };
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(token, logger)),
                _ = tokio::time::sleep_until(wake) => {}
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Err(timed_out(token, started, logger));
            }
        }
    }
}

fn timed_out(token: &CorrelationToken, started: Instant, logger: &dyn ActionLogger) -> ActionError {
    let waited = started.elapsed();
    logger.log_error(&format!(
        "Gave up waiting for workflow run containing {} after {:?}",
        token, waited
    ));
    ActionError::Timeout {
        token: token.to_string(),
        waited,
    }
}

fn cancelled(token: &CorrelationToken, logger: &dyn ActionLogger) -> ActionError {
    logger.log_error(&format!(
        "Cancelled while waiting for workflow run containing {}",
        token
    ));
    ActionError::Cancelled {
        token: token.to_string(),
    }
}
