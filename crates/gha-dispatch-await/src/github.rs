//! GitHub REST client for workflow dispatch and run listing.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::{Response, Url};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::GithubConfig;
use crate::credentials::Credential;
use crate::error::{ActionError, Result};
use crate::input::{DispatchRequest, WorkflowTarget};
use crate::provider::{DispatchResponse, WorkflowProvider};
use crate::run::{WorkflowRun, WorkflowRunsPage};

pub const GITHUB_API_VERSION: &str = "2022-11-28";
pub const GITHUB_ACCEPT: &str = "application/vnd.github+json";

const OP_DISPATCH: &str = "dispatch";
const OP_LIST_RUNS: &str = "list_runs";

#[derive(Serialize)]
struct DispatchBody<'a> {
    #[serde(rename = "ref")]
    git_ref: &'a str,
    inputs: &'a BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Client for the two Actions endpoints used by the action.
#[derive(Debug, Clone)]
pub struct GithubClient {
    config: GithubConfig,
    http_client: reqwest::Client,
}

impl GithubClient {
    /// Create a new GitHub client
    pub fn new(config: GithubConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_ACCEPT));
        headers.insert(
            HeaderName::from_static("x-github-api-version"),
            HeaderValue::from_static(GITHUB_API_VERSION),
        );

        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(config.request_timeout)
            // a redirected dispatch would be replayed as a GET
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ActionError::from_reqwest("client_init", e))?;

        Ok(GithubClient {
            config,
            http_client,
        })
    }

    /// Create client from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(GithubConfig::from_env())
    }

    pub fn config(&self) -> &GithubConfig {
        &self.config
    }

    /// `{api}/repos/{owner}/{repo}/actions/workflows/{workflow}/{leaf}`
    fn workflow_url(&self, target: &WorkflowTarget, leaf: &str) -> Result<Url> {
        let workflow = target.workflow.to_string();
        let mut url = Url::parse(&self.config.api_base_url).map_err(|e| {
            ActionError::validation(format!(
                "invalid API base URL '{}': {}",
                self.config.api_base_url, e
            ))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                ActionError::validation(format!(
                    "API base URL '{}' cannot carry a path",
                    self.config.api_base_url
                ))
            })?
            .pop_if_empty()
            .extend([
                "repos",
                target.owner.as_str(),
                target.repo.as_str(),
                "actions",
                "workflows",
                workflow.as_str(),
                leaf,
            ]);
        Ok(url)
    }
}

/// Turn an error status into `ActionError::Api`, keeping GitHub's message.
async fn error_for_status(operation: &'static str, response: Response) -> ActionError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .map(|b| b.message)
        .unwrap_or(body);
    ActionError::Api {
        operation,
        status,
        message,
    }
}

#[async_trait]
impl WorkflowProvider for GithubClient {
    async fn dispatch(
        &self,
        request: &DispatchRequest,
        credential: &Credential,
    ) -> Result<DispatchResponse> {
        let url = self.workflow_url(&request.target, "dispatches")?;
        debug!(url = %url, git_ref = %request.branch_ref, "POST workflow dispatch");

        let response = self
            .http_client
            .post(url)
            .bearer_auth(credential.token())
            .json(&DispatchBody {
                git_ref: &request.branch_ref,
                inputs: &request.inputs,
            })
            .send()
            .await
            .map_err(|e| ActionError::from_reqwest(OP_DISPATCH, e))?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(error_for_status(OP_DISPATCH, response).await);
        }
        Ok(DispatchResponse {
            status: status.as_u16(),
        })
    }

    async fn list_runs(
        &self,
        target: &WorkflowTarget,
        credential: &Credential,
    ) -> Result<Vec<WorkflowRun>> {
        let url = self.workflow_url(target, "runs")?;
        debug!(url = %url, "GET workflow runs");

        let response = self
            .http_client
            .get(url)
            .bearer_auth(credential.token())
            .send()
            .await
            .map_err(|e| ActionError::from_reqwest(OP_LIST_RUNS, e))?;

        if !response.status().is_success() {
            return Err(error_for_status(OP_LIST_RUNS, response).await);
        }

        let page: WorkflowRunsPage = response
            .json()
            .await
            .map_err(|e| ActionError::from_reqwest(OP_LIST_RUNS, e))?;
        Ok(page.workflow_runs)
    }
}
