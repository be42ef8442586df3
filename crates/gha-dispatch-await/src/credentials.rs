//! Credential lookup: repository URL → bearer token.

use crate::config::{IntegrationsConfig, DEFAULT_HOST};
use crate::error::{ActionError, Result};
use async_trait::async_trait;
use reqwest::Url;
use std::fmt;

/// Bearer token. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Credential(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Resolves a token for a repository URL such as `https://github.com/org/repo`.
#[async_trait]
pub trait CredentialsProvider: Send + Sync {
    /// `Ok(None)` when no token is configured for the repository.
    async fn credentials_for(&self, repo_url: &Url) -> Result<Option<Credential>>;
}

/// Always returns the same token.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    credential: Option<Credential>,
}

impl StaticCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        StaticCredentials {
            credential: (!token.is_empty()).then(|| Credential(token)),
        }
    }

    /// Provider that never has a token.
    pub fn none() -> Self {
        StaticCredentials { credential: None }
    }
}

#[async_trait]
impl CredentialsProvider for StaticCredentials {
    async fn credentials_for(&self, _repo_url: &Url) -> Result<Option<Credential>> {
        Ok(self.credential.clone())
    }
}

/// Looks the repository host up in the configured GitHub integrations.
#[derive(Debug, Clone)]
pub struct IntegrationCredentials {
    integrations: IntegrationsConfig,
}

impl IntegrationCredentials {
    pub fn new(integrations: IntegrationsConfig) -> Self {
        IntegrationCredentials { integrations }
    }

    pub fn from_env() -> Self {
        Self::new(IntegrationsConfig::from_env())
    }
}

#[async_trait]
impl CredentialsProvider for IntegrationCredentials {
    async fn credentials_for(&self, repo_url: &Url) -> Result<Option<Credential>> {
        let host = repo_url.host_str().unwrap_or_default();
        Ok(self
            .integrations
            .find_host(host)
            .and_then(|i| i.token.as_deref())
            .filter(|t| !t.is_empty())
            .map(Credential::new))
    }
}

/// `https://{host}/{owner}/{repo}` with percent-encoded path segments.
pub fn repository_url(host: &str, owner: &str, repo: &str) -> Result<Url> {
    let mut url = Url::parse(&format!("https://{}", host))
        .map_err(|e| ActionError::validation(format!("invalid host '{}': {}", host, e)))?;
    url.path_segments_mut()
        .map_err(|_| ActionError::validation(format!("invalid host '{}'", host)))?
        .clear()
        .push(owner)
        .push(repo);
    Ok(url)
}

/// Repository URL on github.com.
pub fn github_repository_url(owner: &str, repo: &str) -> Result<Url> {
    repository_url(DEFAULT_HOST, owner, repo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GithubIntegration;

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::new("ghp_secret");
        assert_eq!(format!("{:?}", credential), "Credential(<redacted>)");
        assert_eq!(credential.token(), "ghp_secret");
    }

    #[test]
    fn test_repository_url_encodes_segments() {
        let url = github_repository_url("my org", "repo#1").unwrap();
        assert_eq!(url.as_str(), "https://github.com/my%20org/repo%231");
    }

    #[tokio::test]
    async fn test_static_credentials() {
        let url = github_repository_url("o", "r").unwrap();
        let found = StaticCredentials::new("abc").credentials_for(&url).await.unwrap();
        assert_eq!(found.unwrap().token(), "abc");

        assert!(StaticCredentials::new("").credentials_for(&url).await.unwrap().is_none());
        assert!(StaticCredentials::none().credentials_for(&url).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_integration_credentials_by_host() {
        let provider = IntegrationCredentials::new(IntegrationsConfig {
            github: vec![
                GithubIntegration {
                    host: "github.com".to_string(),
                    token: Some("public".to_string()),
                    api_base_url: None,
                },
                GithubIntegration {
                    host: "ghe.example.com".to_string(),
                    token: None,
                    api_base_url: None,
                },
            ],
        });

        let public = github_repository_url("o", "r").unwrap();
        let found = provider.credentials_for(&public).await.unwrap();
        assert_eq!(found.unwrap().token(), "public");

        let enterprise = repository_url("ghe.example.com", "o", "r").unwrap();
        assert!(provider.credentials_for(&enterprise).await.unwrap().is_none());

        let unknown = repository_url("gitlab.com", "o", "r").unwrap();
        assert!(provider.credentials_for(&unknown).await.unwrap().is_none());
    }
}
