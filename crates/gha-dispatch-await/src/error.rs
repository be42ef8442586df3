//! Error types for the dispatch-and-await action

use std::time::Duration;
use thiserror::Error;

/// Coarse classification of an [`ActionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Credential,
    Transport,
    WorkflowFailed,
    Timeout,
    Cancelled,
}

/// Errors that can abort a dispatch-and-await invocation
#[derive(Error, Debug)]
pub enum ActionError {
    /// Malformed or missing input; raised before any network activity
    #[error("Invalid input: {0}")]
    Validation(String),

    /// No usable token for the target repository
    #[error(
        "No token available for: {url}. Make sure GitHub auth is configured correctly."
    )]
    Credential { url: String },

    /// Network-level failure (connect, TLS, timeout, broken body)
    #[error("Transport error during {operation}: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },

    /// The GitHub API answered with an error status
    #[error("GitHub API returned {status} during {operation}: {message}")]
    Api {
        operation: &'static str,
        status: u16,
        message: String,
    },

    /// The response body did not have the expected shape
    #[error("Failed to decode response during {operation}: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },

    /// The tracked run completed with a non-success conclusion
    #[error("Workflow did not succeed. Conclusion: {conclusion}")]
    WorkflowFailed {
        conclusion: String,
        workflow_run_url: String,
    },

    /// The poll deadline elapsed before the run reached a terminal state
    #[error("Timed out after {waited:?} waiting for workflow run containing '{token}'")]
    Timeout { token: String, waited: Duration },

    /// The caller cancelled the invocation
    #[error("Cancelled while waiting for workflow run containing '{token}'")]
    Cancelled { token: String },
}

impl ActionError {
    pub fn validation(message: impl Into<String>) -> Self {
        ActionError::Validation(message.into())
    }

    /// Taxonomy bucket this error belongs to.
    ///
    /// API statuses and undecodable bodies are transport-layer failures.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ActionError::Validation(_) => ErrorKind::Validation,
            ActionError::Credential { .. } => ErrorKind::Credential,
            ActionError::Transport { .. } | ActionError::Api { .. } | ActionError::Decode { .. } => {
                ErrorKind::Transport
            }
            ActionError::WorkflowFailed { .. } => ErrorKind::WorkflowFailed,
            ActionError::Timeout { .. } => ErrorKind::Timeout,
            ActionError::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// Whether a failed run listing may be retried on the next poll cycle.
    pub fn is_retryable(&self) -> bool {
        match self {
            ActionError::Transport { .. } => true,
            ActionError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Map a reqwest failure for the named operation.
    pub(crate) fn from_reqwest(operation: &'static str, err: reqwest::Error) -> Self {
        if err.is_decode() {
            ActionError::Decode {
                operation,
                message: err.to_string(),
            }
        } else {
            ActionError::Transport {
                operation,
                message: err.to_string(),
            }
        }
    }
}

/// Result type for action operations
pub type Result<T> = std::result::Result<T, ActionError>;
