//! Capabilities the hosting framework hands to an action invocation.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::input::ActionInput;

/// Progress / error sink. Fire-and-forget.
pub trait ActionLogger: Send + Sync {
    fn log_info(&self, message: &str);
    fn log_error(&self, message: &str);
}

/// Narrow view of the framework context for one invocation.
pub trait ActionContext: ActionLogger {
    fn input(&self) -> &ActionInput;
    fn is_dry_run(&self) -> bool;
    fn set_output(&mut self, key: &str, value: Value);

    /// Fires when the caller abandons the invocation.
    fn cancellation(&self) -> CancellationToken {
        CancellationToken::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub level: LogLevel,
    pub message: String,
}

/// Standalone context: logs through `tracing`, keeps the log lines and the
/// outputs for the caller to inspect afterwards.
#[derive(Debug)]
pub struct TaskContext {
    input: ActionInput,
    dry_run: bool,
    cancel: CancellationToken,
    outputs: BTreeMap<String, Value>,
    lines: Mutex<Vec<LogLine>>,
}

impl TaskContext {
    pub fn new(input: ActionInput) -> Self {
        TaskContext {
            input,
            dry_run: false,
            cancel: CancellationToken::new(),
            outputs: BTreeMap::new(),
            lines: Mutex::new(Vec::new()),
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn outputs(&self) -> &BTreeMap<String, Value> {
        &self.outputs
    }

    pub fn output(&self, key: &str) -> Option<&Value> {
        self.outputs.get(key)
    }

    pub fn into_outputs(self) -> BTreeMap<String, Value> {
        self.outputs
    }

    /// Snapshot of everything logged so far.
    pub fn log_lines(&self) -> Vec<LogLine> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    fn record(&self, level: LogLevel, message: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(LogLine {
                level,
                message: message.to_string(),
            });
        }
    }
}

impl ActionLogger for TaskContext {
    fn log_info(&self, message: &str) {
        info!("{}", message);
        self.record(LogLevel::Info, message);
    }

    fn log_error(&self, message: &str) {
        error!("{}", message);
        self.record(LogLevel::Error, message);
    }
}

impl ActionContext for TaskContext {
    fn input(&self) -> &ActionInput {
        &self.input
    }

    fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn set_output(&mut self, key: &str, value: Value) {
        self.outputs.insert(key.to_string(), value);
    }

    fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }
}
