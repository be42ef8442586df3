//! gha-dispatch-await - trigger a GitHub Actions workflow and wait for it
//!
//! ## Commands
//!
//! - `run`: dispatch a workflow and block until the correlated run concludes
//! - `describe`: print the action metadata (id, schemas, examples)

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gha_dispatch_await::config::{max_wait_from_secs, DEFAULT_HOST};
use gha_dispatch_await::input::TRIGGER_EVENT_KEY;
use gha_dispatch_await::{
    init_tracing, metadata, ActionInput, CredentialsProvider, DispatchAwaitAction, GithubClient,
    GithubConfig, IntegrationCredentials, IntegrationsConfig, LogLevel, PollConfig,
    StaticCredentials, TaskContext, WorkflowRef,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "gha-dispatch-await")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Trigger a GitHub Actions workflow and await its conclusion", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dispatch a workflow and wait for the run to conclude
    Run {
        /// Action input as a JSON file (repo, owner, workflow, branchName, inputs)
        #[arg(long, conflicts_with_all = ["owner", "repo", "workflow", "branch"])]
        input_file: Option<PathBuf>,

        /// Repository owner (organization or user)
        #[arg(long, required_unless_present = "input_file")]
        owner: Option<String>,

        /// Repository name
        #[arg(long, required_unless_present = "input_file")]
        repo: Option<String>,

        /// Workflow id or file name (e.g. deploy.yml)
        #[arg(long, required_unless_present = "input_file")]
        workflow: Option<String>,

        /// Branch to run the workflow on
        #[arg(long, required_unless_present = "input_file")]
        branch: Option<String>,

        /// Workflow input as key=value (repeatable)
        #[arg(short, long = "input", value_parser = parse_key_val)]
        inputs: Vec<(String, String)>,

        /// Correlation token; must appear in the workflow's run-name
        #[arg(long, conflicts_with = "generate_trigger_event")]
        trigger_event: Option<String>,

        /// Use a random UUID as correlation token
        #[arg(long)]
        generate_trigger_event: bool,

        /// Log the plan without calling GitHub
        #[arg(long)]
        dry_run: bool,

        /// Seconds between two run listings
        #[arg(long, default_value = "5")]
        poll_interval_secs: u64,

        /// Give up after this many seconds (0 waits forever)
        #[arg(long, default_value = "3600")]
        max_wait_secs: u64,

        /// GitHub host the repository lives on
        #[arg(long, default_value = DEFAULT_HOST)]
        host: String,

        /// Integrations config (JSON) mapping hosts to tokens
        #[arg(long)]
        integrations: Option<PathBuf>,

        /// Bearer token; overrides the integrations config
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// GitHub API root (defaults to the host's API)
        #[arg(long, env = "GITHUB_API_URL")]
        api_url: Option<String>,
    },

    /// Print the action metadata as JSON
    Describe,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    match cli.command {
        Commands::Describe => cmd_describe(),
        Commands::Run {
            input_file,
            owner,
            repo,
            workflow,
            branch,
            inputs,
            trigger_event,
            generate_trigger_event,
            dry_run,
            poll_interval_secs,
            max_wait_secs,
            host,
            integrations,
            token,
            api_url,
        } => {
            let mut input = match input_file {
                Some(path) => read_input_file(&path)?,
                None => ActionInput {
                    owner: owner.unwrap_or_default(),
                    repo: repo.unwrap_or_default(),
                    workflow: WorkflowRef::from(workflow.unwrap_or_default().as_str()),
                    branch_name: branch.unwrap_or_default(),
                    inputs: BTreeMap::new(),
                },
            };
            input.inputs.extend(inputs);
            if let Some(token) = trigger_event {
                input.inputs.insert(TRIGGER_EVENT_KEY.to_string(), token);
            } else if generate_trigger_event {
                let token = uuid::Uuid::new_v4().to_string();
                info!("Generated trigger_event {}", token);
                input.inputs.insert(TRIGGER_EVENT_KEY.to_string(), token);
            }

            let poll = PollConfig::from_env()
                .with_interval(Duration::from_secs(poll_interval_secs))
                .with_max_wait(max_wait_from_secs(max_wait_secs));

            cmd_run(
                input,
                dry_run,
                poll,
                &host,
                integrations.as_deref(),
                token,
                api_url,
                cli.verbose,
            )
            .await
        }
    }
}

fn cmd_describe() -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&metadata())?);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn cmd_run(
    input: ActionInput,
    dry_run: bool,
    poll: PollConfig,
    host: &str,
    integrations: Option<&Path>,
    token: Option<String>,
    api_url: Option<String>,
    verbose: bool,
) -> Result<()> {
    input.validate().context("Invalid action input")?;

    let integrations = match integrations {
        Some(path) => IntegrationsConfig::from_file(path)
            .with_context(|| format!("Failed to load integrations from {:?}", path))?,
        None => IntegrationsConfig::from_env(),
    };

    let github_config = match (&api_url, integrations.find_host(host)) {
        (Some(url), _) => GithubConfig::new(url),
        (None, Some(integration)) => integration.api_config(),
        (None, None) => GithubConfig::for_host(host),
    };
    let credentials: Arc<dyn CredentialsProvider> = match token.filter(|t| !t.is_empty()) {
        Some(token) => Arc::new(StaticCredentials::new(token)),
        None => Arc::new(IntegrationCredentials::new(integrations)),
    };

    let client = GithubClient::new(github_config).context("Failed to create GitHub client")?;
    let action = DispatchAwaitAction::new(Arc::new(client), credentials, poll).with_host(host);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            on_signal.cancel();
        }
    });

    let mut ctx = TaskContext::new(input)
        .with_dry_run(dry_run)
        .with_cancellation(cancel);
    let result = action.handle(&mut ctx).await;

    if verbose {
        for line in ctx.log_lines() {
            let marker = match line.level {
                LogLevel::Info => "info",
                LogLevel::Error => "error",
            };
            eprintln!("[{}] {}", marker, line.message);
        }
    }

    let output = result.context("Workflow dispatch-and-await failed")?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn read_input_file(path: &Path) -> Result<ActionInput> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    let value: serde_json::Value =
        serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {:?}", path))?;
    ActionInput::from_value(value).context("Invalid action input")
}

/// Parse `key=value` into a pair; the value may itself contain `=`.
fn parse_key_val(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    if key.is_empty() {
        return Err(format!("empty key in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("env=prod").unwrap(),
            ("env".to_string(), "prod".to_string())
        );
        assert_eq!(
            parse_key_val("query=a=b").unwrap(),
            ("query".to_string(), "a=b".to_string())
        );
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=x").is_err());
    }

    #[test]
    fn test_run_args_parse() {
        let cli = Cli::try_parse_from([
            "gha-dispatch-await",
            "run",
            "--owner",
            "my-org",
            "--repo",
            "test-repo",
            "--workflow",
            "test.yml",
            "--branch",
            "main",
            "-i",
            "env=staging",
            "--trigger-event",
            "unique_identifier",
            "--dry-run",
        ])
        .unwrap();

        match cli.command {
            Commands::Run {
                owner,
                inputs,
                trigger_event,
                dry_run,
                ..
            } => {
                assert_eq!(owner.as_deref(), Some("my-org"));
                assert_eq!(inputs, vec![("env".to_string(), "staging".to_string())]);
                assert_eq!(trigger_event.as_deref(), Some("unique_identifier"));
                assert!(dry_run);
            }
            Commands::Describe => panic!("expected run"),
        }
    }

    #[test]
    fn test_run_requires_target_without_input_file() {
        assert!(Cli::try_parse_from(["gha-dispatch-await", "run", "--owner", "o"]).is_err());
    }

    #[test]
    fn test_read_input_file_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.json");
        std::fs::write(
            &path,
            r#"{"owner":"","repo":"","workflow":-1,"inputs":{"trigger_event":"test"},"branchName":"none"}"#,
        )
        .unwrap();

        assert!(read_input_file(&path).is_err());
    }

    #[tokio::test]
    async fn test_dry_run_command_succeeds_offline() {
        let input = ActionInput::from_value(serde_json::json!({
            "repo": "test-repo",
            "owner": "my-org",
            "workflow": "test.yml",
            "branchName": "main",
            "inputs": { "trigger_event": "unique_identifier" }
        }))
        .unwrap();

        cmd_run(
            input,
            true,
            PollConfig::default(),
            DEFAULT_HOST,
            None,
            Some("ghp_dry".to_string()),
            Some("http://127.0.0.1:1".to_string()),
            false,
        )
        .await
        .unwrap();
    }
}
