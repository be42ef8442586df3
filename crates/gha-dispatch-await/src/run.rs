//! Workflow run snapshots as reported by GitHub, and the poll result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a workflow run.
///
/// Unrecognised values are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RunStatus {
    Requested,
    Queued,
    Pending,
    Waiting,
    InProgress,
    Completed,
    Other(String),
}

impl RunStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RunStatus::Requested => "requested",
            RunStatus::Queued => "queued",
            RunStatus::Pending => "pending",
            RunStatus::Waiting => "waiting",
            RunStatus::InProgress => "in_progress",
            RunStatus::Completed => "completed",
            RunStatus::Other(s) => s,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed)
    }
}

impl From<String> for RunStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "requested" => RunStatus::Requested,
            "queued" => RunStatus::Queued,
            "pending" => RunStatus::Pending,
            "waiting" => RunStatus::Waiting,
            "in_progress" => RunStatus::InProgress,
            "completed" => RunStatus::Completed,
            _ => RunStatus::Other(s),
        }
    }
}

impl From<RunStatus> for String {
    fn from(status: RunStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome classification of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Conclusion {
    Success,
    Failure,
    Cancelled,
    Skipped,
    TimedOut,
    ActionRequired,
    Neutral,
    Stale,
    StartupFailure,
    Other(String),
}

impl Conclusion {
    pub fn as_str(&self) -> &str {
        match self {
            Conclusion::Success => "success",
            Conclusion::Failure => "failure",
            Conclusion::Cancelled => "cancelled",
            Conclusion::Skipped => "skipped",
            Conclusion::TimedOut => "timed_out",
            Conclusion::ActionRequired => "action_required",
            Conclusion::Neutral => "neutral",
            Conclusion::Stale => "stale",
            Conclusion::StartupFailure => "startup_failure",
            Conclusion::Other(s) => s,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Conclusion::Success)
    }
}

impl From<String> for Conclusion {
    fn from(s: String) -> Self {
        match s.as_str() {
            "success" => Conclusion::Success,
            "failure" => Conclusion::Failure,
            "cancelled" => Conclusion::Cancelled,
            "skipped" => Conclusion::Skipped,
            "timed_out" => Conclusion::TimedOut,
            "action_required" => Conclusion::ActionRequired,
            "neutral" => Conclusion::Neutral,
            "stale" => Conclusion::Stale,
            "startup_failure" => Conclusion::StartupFailure,
            _ => Conclusion::Other(s),
        }
    }
}

impl From<Conclusion> for String {
    fn from(conclusion: Conclusion) -> Self {
        conclusion.as_str().to_string()
    }
}

impl fmt::Display for Conclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of `workflow_runs` in the list-runs response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRun {
    #[serde(default)]
    pub id: u64,

    /// Display name; carries the run-name, and with it the correlation token.
    #[serde(default)]
    pub name: Option<String>,

    pub status: RunStatus,

    #[serde(default)]
    pub conclusion: Option<Conclusion>,

    pub html_url: String,

    #[serde(default)]
    pub run_number: Option<u64>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl WorkflowRun {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }
}

/// Body of `GET /repos/{owner}/{repo}/actions/workflows/{workflow}/runs`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowRunsPage {
    #[serde(default)]
    pub total_count: Option<u64>,
    pub workflow_runs: Vec<WorkflowRun>,
}

/// Terminal outcome of a successful wait.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResult {
    pub conclusion: String,
    pub workflow_run_url: String,
}
