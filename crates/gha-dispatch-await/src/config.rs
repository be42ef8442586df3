//! Configuration: poll timing, GitHub API client settings and integrations.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_MAX_LIST_FAILURES: u32 = 3;
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";
pub const DEFAULT_HOST: &str = "github.com";

/// Errors raised while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid integrations config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid integrations config: {0}")]
    Invalid(String),
}

/// Poll loop timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Fixed delay between two run listings.
    pub interval: Duration,
    /// Overall deadline; `None` waits forever (only cancellation stops it).
    pub max_wait: Option<Duration>,
    /// Consecutive retryable listing failures tolerated before giving up.
    pub max_consecutive_list_failures: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig {
            interval: env_secs("DISPATCH_AWAIT_POLL_INTERVAL_SECS").unwrap_or(DEFAULT_POLL_INTERVAL),
            max_wait: match std::env::var("DISPATCH_AWAIT_MAX_WAIT_SECS") {
                Ok(raw) => parse_max_wait(&raw),
                Err(_) => Some(DEFAULT_MAX_WAIT),
            },
            max_consecutive_list_failures: std::env::var("DISPATCH_AWAIT_MAX_LIST_FAILURES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_LIST_FAILURES),
        }
    }
}

impl PollConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_wait(mut self, max_wait: Option<Duration>) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn with_max_consecutive_list_failures(mut self, limit: u32) -> Self {
        self.max_consecutive_list_failures = limit;
        self
    }
}

/// Deadline for a `max_wait` given in seconds; `0` waits forever.
pub fn max_wait_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

fn parse_max_wait(raw: &str) -> Option<Duration> {
    match raw.trim().parse::<u64>() {
        Ok(secs) => max_wait_from_secs(secs),
        Err(_) => Some(DEFAULT_MAX_WAIT),
    }
}

/// GitHub REST client settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubConfig {
    /// API root, without trailing slash
    pub api_base_url: String,
    pub user_agent: String,
    pub request_timeout: Duration,
}

impl Default for GithubConfig {
    fn default() -> Self {
        GithubConfig {
            api_base_url: std::env::var("GITHUB_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string()),
            user_agent: format!("gha-dispatch-await/{}", env!("CARGO_PKG_VERSION")),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl GithubConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Config for an explicit API root (GitHub Enterprise, test servers).
    pub fn new(api_base_url: &str) -> Self {
        GithubConfig {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// API root for a GitHub host: `api.github.com` for github.com,
    /// `https://{host}/api/v3` for Enterprise Server.
    pub fn for_host(host: &str) -> Self {
        if host == DEFAULT_HOST {
            Self::new(DEFAULT_API_BASE_URL)
        } else {
            Self::new(&format!("https://{}/api/v3", host))
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }
}

/// One configured GitHub host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GithubIntegration {
    pub host: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub api_base_url: Option<String>,
}

impl GithubIntegration {
    pub fn api_config(&self) -> GithubConfig {
        match &self.api_base_url {
            Some(url) => GithubConfig::new(url),
            None => GithubConfig::for_host(&self.host),
        }
    }
}

/// `{"github": [{"host": ..., "token": ..., "apiBaseUrl": ...}]}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationsConfig {
    #[serde(default)]
    pub github: Vec<GithubIntegration>,
}

impl IntegrationsConfig {
    /// Load from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: IntegrationsConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Single github.com integration from `GITHUB_TOKEN` or `GH_TOKEN`.
    pub fn from_env() -> Self {
        let token = std::env::var("GITHUB_TOKEN")
            .or_else(|_| std::env::var("GH_TOKEN"))
            .ok()
            .filter(|t| !t.is_empty());
        IntegrationsConfig {
            github: vec![GithubIntegration {
                host: DEFAULT_HOST.to_string(),
                token,
                api_base_url: std::env::var("GITHUB_API_URL").ok(),
            }],
        }
    }

    pub fn find_host(&self, host: &str) -> Option<&GithubIntegration> {
        self.github
            .iter()
            .find(|i| i.host.eq_ignore_ascii_case(host))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for integration in &self.github {
            if integration.host.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "github integration with empty host".to_string(),
                ));
            }
        }
        Ok(())
    }
}

fn env_secs(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
}
