//! The `github:actions:dispatch:await` action.
//!
//! Resolves a token for the repository, dispatches the workflow, then waits
//! for the correlated run to conclude. In dry-run mode only the plan is logged.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::Instrument;

use crate::config::{PollConfig, DEFAULT_HOST};
use crate::context::ActionContext;
use crate::credentials::{repository_url, Credential, CredentialsProvider};
use crate::dispatcher::Dispatcher;
use crate::error::{ActionError, Result};
use crate::input::ActionInput;
use crate::obs;
use crate::poller::CompletionPoller;
use crate::provider::WorkflowProvider;
use crate::run::PollResult;

pub const ACTION_ID: &str = "github:actions:dispatch:await";
pub const ACTION_DESCRIPTION: &str = "Trigger and await GitHub Action";
pub const DRY_RUN_CONCLUSION: &str = "dry-run";
pub const OUTPUT_CONCLUSION: &str = "conclusion";
pub const OUTPUT_WORKFLOW_RUN_URL: &str = "workflowRunUrl";

/// Values the action publishes. `workflow_run_url` is absent on dry runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutput {
    pub conclusion: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_run_url: Option<String>,
}

impl ActionOutput {
    pub fn dry_run() -> Self {
        ActionOutput {
            conclusion: DRY_RUN_CONCLUSION.to_string(),
            workflow_run_url: None,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.conclusion == DRY_RUN_CONCLUSION
    }
}

impl From<PollResult> for ActionOutput {
    fn from(result: PollResult) -> Self {
        ActionOutput {
            conclusion: result.conclusion,
            workflow_run_url: Some(result.workflow_run_url),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateExample {
    pub description: String,
    pub example: Value,
}

/// Self-description published to the hosting framework.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionMetadata {
    pub id: String,
    pub description: String,
    pub supports_dry_run: bool,
    pub input_schema: Value,
    pub output_schema: Value,
    pub examples: Vec<TemplateExample>,
}

pub fn metadata() -> ActionMetadata {
    ActionMetadata {
        id: ACTION_ID.to_string(),
        description: ACTION_DESCRIPTION.to_string(),
        supports_dry_run: true,
        input_schema: json!({
            "type": "object",
            "required": ["repo", "owner", "workflow", "branchName", "inputs"],
            "properties": {
                "repo": { "type": "string", "description": "Name of the repository" },
                "owner": {
                    "type": "string",
                    "description": "Name of the owner. Could be organization or user"
                },
                "workflow": {
                    "type": ["string", "integer"],
                    "minimum": 0,
                    "description": "Id or filename of the workflow"
                },
                "branchName": {
                    "type": "string",
                    "description": "Name of the branch to trigger the workflow on"
                },
                "inputs": {
                    "type": "object",
                    "description": "Inputs to the workflow",
                    "required": ["trigger_event"],
                    "properties": {
                        "trigger_event": {
                            "type": "string",
                            "description": "Trigger event for the workflow"
                        }
                    },
                    "additionalProperties": { "type": "string" }
                }
            }
        }),
        output_schema: json!({
            "type": "object",
            "properties": {
                "conclusion": { "type": "string", "description": "Conclusion of the workflow" },
                "workflowRunUrl": { "type": "string", "description": "URL link to workflow run" }
            }
        }),
        examples: vec![TemplateExample {
            description: "GitHub Action Workflow Await only with required input.".to_string(),
            example: json!({
                "steps": [{
                    "action": ACTION_ID,
                    "name": "Dispatch Github Action Workflow & Await",
                    "input": {
                        "repo": "test-repo",
                        "owner": "my-org",
                        "workflow": "test.yml",
                        "branchName": "main",
                        "inputs": { "trigger_event": "unique_identifier" }
                    }
                }]
            }),
        }],
    }
}

/// Dispatch-and-await action bound to a provider and a credential source.
pub struct DispatchAwaitAction {
    provider: Arc<dyn WorkflowProvider>,
    credentials: Arc<dyn CredentialsProvider>,
    poll: PollConfig,
    host: String,
}

impl DispatchAwaitAction {
    pub fn new(
        provider: Arc<dyn WorkflowProvider>,
        credentials: Arc<dyn CredentialsProvider>,
        poll: PollConfig,
    ) -> Self {
        DispatchAwaitAction {
            provider,
            credentials,
            poll,
            host: DEFAULT_HOST.to_string(),
        }
    }

    /// Host used to build the credential lookup URL (GitHub Enterprise).
    pub fn with_host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    pub fn id(&self) -> &'static str {
        ACTION_ID
    }

    pub fn metadata(&self) -> ActionMetadata {
        metadata()
    }

    pub fn poll_config(&self) -> &PollConfig {
        &self.poll
    }

    /// Run one invocation against `ctx`, publishing outputs on success.
    pub async fn handle<C: ActionContext>(&self, ctx: &mut C) -> Result<ActionOutput> {
        let input = ctx.input().clone();
        let span = obs::invocation_span(
            &format!("{}/{}", input.owner, input.repo),
            &input.workflow.to_string(),
            input.trigger_event().unwrap_or_default(),
        );
        self.run(ctx, input).instrument(span).await
    }

    async fn run<C: ActionContext>(&self, ctx: &mut C, input: ActionInput) -> Result<ActionOutput> {
        input.validate()?;
        let credential = self.resolve_credential(ctx, &input).await?;

        if ctx.is_dry_run() {
            return Ok(self.dry_run(ctx, &input));
        }

        let request = input.to_dispatch_request();
        let receipt = Dispatcher::new(self.provider.as_ref())
            .dispatch(&request, &credential, &*ctx)
            .await?;

        let cancel = ctx.cancellation();
        let result = CompletionPoller::new(self.provider.as_ref(), &self.poll)
            .await_completion(&request.target, &receipt.token, &credential, &*ctx, &cancel)
            .await?;

        ctx.set_output(OUTPUT_CONCLUSION, json!(result.conclusion));
        ctx.set_output(OUTPUT_WORKFLOW_RUN_URL, json!(result.workflow_run_url));
        Ok(ActionOutput::from(result))
    }

    async fn resolve_credential<C: ActionContext>(
        &self,
        ctx: &C,
        input: &ActionInput,
    ) -> Result<Credential> {
        let url = repository_url(&self.host, &input.owner, &input.repo)?;
        match self.credentials.credentials_for(&url).await? {
            Some(credential) => Ok(credential),
            None => {
                ctx.log_error(&format!("Failed to retrieve token for: {}", url));
                Err(ActionError::Credential {
                    url: url.to_string(),
                })
            }
        }
    }

    fn dry_run<C: ActionContext>(&self, ctx: &mut C, input: &ActionInput) -> ActionOutput {
        let repo = format!("{}/{}", input.owner, input.repo);
        let inputs = serde_json::to_string(&input.inputs).unwrap_or_default();

        ctx.log_info(&format!(
            "Requested credentials from https://{}/{}",
            self.host, repo
        ));
        ctx.log_info(&format!(
            "Will trigger the workflow {} for repo {} on branch {} with inputs {}",
            input.workflow, repo, input.branch_name, inputs
        ));
        ctx.log_info(&format!(
            "Will await completion of the workflow {} for repo {} with run_name containing {}",
            input.workflow,
            repo,
            input.trigger_event().unwrap_or_default()
        ));
        ctx.log_info("Dry run complete");

        ctx.set_output(OUTPUT_CONCLUSION, json!(DRY_RUN_CONCLUSION));
        ActionOutput::dry_run()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TaskContext;
    use crate::credentials::StaticCredentials;
    use crate::error::ErrorKind;
    use crate::fakes::{self, ScriptedProvider};
    use std::time::Duration;

    fn input(raw: Value) -> ActionInput {
        ActionInput::from_value(raw).unwrap()
    }

    fn sample_input() -> ActionInput {
        input(json!({
            "repo": "app",
            "owner": "acme",
            "workflow": "deploy.yml",
            "branchName": "main",
            "inputs": { "trigger_event": "req-123", "env": "prod" }
        }))
    }

    fn action(provider: Arc<ScriptedProvider>, credentials: StaticCredentials) -> DispatchAwaitAction {
        DispatchAwaitAction::new(
            provider,
            Arc::new(credentials),
            PollConfig::default()
                .with_interval(Duration::from_secs(5))
                .with_max_wait(Some(Duration::from_secs(300))),
        )
    }

    #[test]
    fn test_metadata() {
        let meta = metadata();
        assert_eq!(meta.id, "github:actions:dispatch:await");
        assert!(meta.supports_dry_run);
        assert_eq!(meta.examples.len(), 1);
        let example_input = meta.examples[0].example["steps"][0]["input"].clone();
        assert!(ActionInput::from_value(example_input).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_sets_outputs() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .with_listing(vec![])
                .with_listing(vec![fakes::run(11, "Deploy req-123", "completed", Some("success"))]),
        );
        let action = action(provider.clone(), StaticCredentials::new("ghp_x"));
        let mut ctx = TaskContext::new(sample_input());

        let output = action.handle(&mut ctx).await.unwrap();

        assert_eq!(output.conclusion, "success");
        assert_eq!(
            ctx.output(OUTPUT_WORKFLOW_RUN_URL),
            Some(&json!("https://github.com/acme/app/actions/runs/11"))
        );
        assert_eq!(ctx.output(OUTPUT_CONCLUSION), Some(&json!("success")));
        assert_eq!(provider.dispatch_calls(), 1);
        assert_eq!(provider.list_calls(), 2);
    }

    #[tokio::test]
    async fn test_dry_run_makes_no_calls() {
        let provider = Arc::new(ScriptedProvider::new());
        let action = action(provider.clone(), StaticCredentials::new("ghp_x"));
        let mut ctx = TaskContext::new(sample_input()).with_dry_run(true);

        let output = action.handle(&mut ctx).await.unwrap();

        assert!(output.is_dry_run());
        assert_eq!(output.workflow_run_url, None);
        assert_eq!(ctx.output(OUTPUT_CONCLUSION), Some(&json!("dry-run")));
        assert!(ctx.output(OUTPUT_WORKFLOW_RUN_URL).is_none());
        assert_eq!(provider.dispatch_calls(), 0);
        assert_eq!(provider.list_calls(), 0);
        assert!(ctx
            .log_lines()
            .iter()
            .any(|l| l.message.contains("run_name containing req-123")));
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_before_dispatch() {
        let provider = Arc::new(ScriptedProvider::new());
        let action = action(provider.clone(), StaticCredentials::none());
        let mut ctx = TaskContext::new(sample_input());

        let err = action.handle(&mut ctx).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Credential);
        assert!(err.to_string().contains("https://github.com/acme/app"));
        assert_eq!(provider.dispatch_calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_trigger_event_fails_without_network() {
        let provider = Arc::new(ScriptedProvider::new());
        let action = action(provider.clone(), StaticCredentials::new("ghp_x"));
        let mut raw = sample_input();
        raw.inputs.insert("trigger_event".to_string(), String::new());
        let mut ctx = TaskContext::new(raw);

        let err = action.handle(&mut ctx).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(provider.dispatch_calls(), 0);
        assert_eq!(provider.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_input_rejected_before_dispatch() {
        let provider = Arc::new(ScriptedProvider::new());
        let action = action(provider.clone(), StaticCredentials::new("ghp_x"));
        let mut bad = sample_input();
        bad.owner = String::new();
        bad.repo = String::new();
        let mut ctx = TaskContext::new(bad);

        let err = action.handle(&mut ctx).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(provider.dispatch_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_run_publishes_no_outputs() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .with_listing(vec![fakes::run(3, "req-123", "completed", Some("cancelled"))]),
        );
        let action = action(provider.clone(), StaticCredentials::new("ghp_x"));
        let mut ctx = TaskContext::new(sample_input());

        let err = action.handle(&mut ctx).await.unwrap_err();

        assert!(matches!(
            err,
            ActionError::WorkflowFailed { ref conclusion, .. } if conclusion == "cancelled"
        ));
        assert!(ctx.outputs().is_empty());
    }
}
