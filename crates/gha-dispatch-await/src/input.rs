//! Action input schema and the dispatch request derived from it.

use crate::error::{ActionError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Key under `inputs` whose value correlates the dispatched run.
pub const TRIGGER_EVENT_KEY: &str = "trigger_event";

/// Workflow identifier: numeric id or workflow file name (e.g. `ci.yml`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkflowRef {
    Id(u64),
    File(String),
}

impl fmt::Display for WorkflowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowRef::Id(id) => write!(f, "{}", id),
            WorkflowRef::File(name) => write!(f, "{}", name),
        }
    }
}

impl From<&str> for WorkflowRef {
    fn from(value: &str) -> Self {
        match value.parse::<u64>() {
            Ok(id) => WorkflowRef::Id(id),
            Err(_) => WorkflowRef::File(value.to_string()),
        }
    }
}

/// Input of the `github:actions:dispatch:await` action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionInput {
    /// Name of the repository.
    pub repo: String,

    /// Name of the owner. Could be organization or user.
    pub owner: String,

    /// Id or filename of the workflow.
    pub workflow: WorkflowRef,

    /// Name of the branch to trigger the workflow on.
    pub branch_name: String,

    /// Inputs to the workflow; must carry `trigger_event`.
    pub inputs: BTreeMap<String, String>,
}

impl ActionInput {
    /// Decode and validate a raw JSON input.
    ///
    /// Shape errors (e.g. a negative workflow id or a non-string input value)
    /// are reported as validation errors.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let input: ActionInput = serde_json::from_value(value)
            .map_err(|e| ActionError::validation(format!("input does not match schema: {}", e)))?;
        input.validate()?;
        Ok(input)
    }

    /// Check the invariants the schema cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.owner.trim().is_empty() {
            return Err(ActionError::validation("`owner` must not be empty"));
        }
        if self.repo.trim().is_empty() {
            return Err(ActionError::validation("`repo` must not be empty"));
        }
        if self.branch_name.trim().is_empty() {
            return Err(ActionError::validation("`branchName` must not be empty"));
        }
        if let WorkflowRef::File(name) = &self.workflow {
            if name.trim().is_empty() {
                return Err(ActionError::validation("`workflow` must not be empty"));
            }
        }
        if !self.inputs.contains_key(TRIGGER_EVENT_KEY) {
            return Err(ActionError::validation(format!(
                "`inputs.{}` is required",
                TRIGGER_EVENT_KEY
            )));
        }
        Ok(())
    }

    pub fn target(&self) -> WorkflowTarget {
        WorkflowTarget {
            owner: self.owner.clone(),
            repo: self.repo.clone(),
            workflow: self.workflow.clone(),
        }
    }

    pub fn to_dispatch_request(&self) -> DispatchRequest {
        DispatchRequest {
            target: self.target(),
            branch_ref: self.branch_name.clone(),
            inputs: self.inputs.clone(),
        }
    }

    /// Raw `trigger_event` value, possibly empty.
    pub fn trigger_event(&self) -> Option<&str> {
        self.inputs.get(TRIGGER_EVENT_KEY).map(String::as_str)
    }
}

/// Repository + workflow addressed by both endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowTarget {
    pub owner: String,
    pub repo: String,
    pub workflow: WorkflowRef,
}

impl WorkflowTarget {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, workflow: WorkflowRef) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            workflow,
        }
    }

    /// `owner/repo`
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

/// A single workflow_dispatch request. Consumed once by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRequest {
    pub target: WorkflowTarget,
    pub branch_ref: String,
    pub inputs: BTreeMap<String, String>,
}

impl DispatchRequest {
    /// Extract the correlation token, failing if it is absent or empty.
    pub fn correlation_token(&self) -> Result<CorrelationToken> {
        match self.inputs.get(TRIGGER_EVENT_KEY) {
            Some(value) => CorrelationToken::new(value.clone()),
            None => Err(missing_token()),
        }
    }
}

/// Caller-chosen marker expected to reappear in the run's display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationToken(String);

impl CorrelationToken {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(missing_token());
        }
        Ok(CorrelationToken(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Substring match against a run's display name.
    pub fn matches(&self, display_name: &str) -> bool {
        display_name.contains(&self.0)
    }
}

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn missing_token() -> ActionError {
    ActionError::validation(format!(
        "Missing input `{}`. Provide this input with unique value so that workflow can be uniquely identified.",
        TRIGGER_EVENT_KEY
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn valid_input() -> serde_json::Value {
        json!({
            "repo": "test-repo",
            "owner": "my-org",
            "workflow": "test.yml",
            "branchName": "main",
            "inputs": { "trigger_event": "unique_identifier", "env": "staging" }
        })
    }

    #[test]
    fn test_from_value_accepts_file_and_id() {
        let input = ActionInput::from_value(valid_input()).unwrap();
        assert_eq!(input.workflow, WorkflowRef::File("test.yml".to_string()));
        assert_eq!(input.trigger_event(), Some("unique_identifier"));

        let mut raw = valid_input();
        raw["workflow"] = json!(1234);
        let input = ActionInput::from_value(raw).unwrap();
        assert_eq!(input.workflow, WorkflowRef::Id(1234));
    }

    #[test]
    fn test_invalid_scenario_rejected() {
        let raw = json!({
            "owner": "",
            "repo": "",
            "workflow": -1,
            "inputs": { "trigger_event": "test" },
            "branchName": "none"
        });
        let err = ActionInput::from_value(raw).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_empty_owner_or_repo_rejected() {
        let mut raw = valid_input();
        raw["owner"] = json!("");
        assert!(ActionInput::from_value(raw).is_err());

        let mut raw = valid_input();
        raw["repo"] = json!("  ");
        assert!(ActionInput::from_value(raw).is_err());
    }

    #[test]
    fn test_non_string_workflow_rejected() {
        let mut raw = valid_input();
        raw["workflow"] = json!({ "file": "ci.yml" });
        let err = ActionInput::from_value(raw).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_non_string_input_value_rejected() {
        let mut raw = valid_input();
        raw["inputs"]["count"] = json!(3);
        assert!(ActionInput::from_value(raw).is_err());
    }

    #[test]
    fn test_absent_trigger_event_rejected_by_schema() {
        let mut raw = valid_input();
        raw["inputs"] = json!({ "env": "staging" });
        let err = ActionInput::from_value(raw).unwrap_err();
        assert!(err.to_string().contains("trigger_event"));
    }

    #[test]
    fn test_correlation_token_requires_value() {
        let mut request = ActionInput::from_value(valid_input())
            .unwrap()
            .to_dispatch_request();
        assert_eq!(
            request.correlation_token().unwrap().as_str(),
            "unique_identifier"
        );

        request
            .inputs
            .insert(TRIGGER_EVENT_KEY.to_string(), String::new());
        assert_eq!(
            request.correlation_token().unwrap_err().kind(),
            ErrorKind::Validation
        );

        request.inputs.remove(TRIGGER_EVENT_KEY);
        assert!(request.correlation_token().is_err());
    }

    #[test]
    fn test_token_matches_by_substring() {
        let token = CorrelationToken::new("deploy-42").unwrap();
        assert!(token.matches("Deploy run deploy-42 by bot"));
        assert!(token.matches("deploy-42"));
        assert!(!token.matches("deploy-4"));
    }

    #[test]
    fn test_workflow_ref_from_str() {
        assert_eq!(WorkflowRef::from("161335"), WorkflowRef::Id(161335));
        assert_eq!(
            WorkflowRef::from("release.yaml"),
            WorkflowRef::File("release.yaml".to_string())
        );
        assert_eq!(WorkflowRef::Id(7).to_string(), "7");
    }
}
