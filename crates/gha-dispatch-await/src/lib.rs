//! gha-dispatch-await - trigger a GitHub Actions workflow and wait for it
//!
//! Provides the `github:actions:dispatch:await` action:
//! - Dispatches a `workflow_dispatch` run carrying a correlation token
//!   (`inputs.trigger_event`)
//! - Finds the run whose display name contains that token among the
//!   workflow's most recent runs
//! - Polls at a fixed interval until it completes, bounded by a deadline and
//!   a cancellation token, and reports the conclusion and run URL
//!
//! ## Layers
//!
//! - `provider` / `github`: the two REST endpoints, behind a trait
//! - `dispatcher` / `poller`: the trigger-and-await protocol
//! - `action` / `context`: the framework-facing action and its capabilities

pub mod action;
pub mod config;
pub mod context;
pub mod credentials;
pub mod dispatcher;
pub mod error;
pub mod fakes;
pub mod github;
pub mod input;
pub mod obs;
pub mod poller;
pub mod provider;
pub mod run;
pub mod telemetry;

// Re-export key types
pub use action::{metadata, ActionMetadata, ActionOutput, DispatchAwaitAction, ACTION_ID};
pub use config::{ConfigError, GithubConfig, IntegrationsConfig, PollConfig};
pub use context::{ActionContext, ActionLogger, LogLevel, LogLine, TaskContext};
pub use credentials::{
    Credential, CredentialsProvider, IntegrationCredentials, StaticCredentials,
};
pub use dispatcher::{DispatchReceipt, Dispatcher};
pub use error::{ActionError, ErrorKind, Result};
pub use github::GithubClient;
pub use input::{ActionInput, CorrelationToken, DispatchRequest, WorkflowRef, WorkflowTarget};
pub use poller::{resolve_run, CompletionPoller, PollState};
pub use provider::{DispatchResponse, WorkflowProvider};
pub use run::{Conclusion, PollResult, RunStatus, WorkflowRun};
pub use telemetry::init_tracing;
pub use tokio_util::sync::CancellationToken;
