//! Error taxonomy shared by the plan store, backends, tools and control loop.
//!
//! Component boundaries return these typed errors so the control loop can
//! classify failures; glue code wraps them in `anyhow` with context.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Missing or invalid setting. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid setting `{key}`: {reason}")]
    Invalid { key: String, reason: String },
    #[error("missing credential: environment variable `{var}` is not set")]
    MissingCredential { var: String },
}

/// The model backend failed or returned something that is not a JSON object.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("render prompt: {0}")]
    Prompt(#[from] minijinja::Error),
    #[error("spawn backend `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("backend timed out after {0:?}")]
    TimedOut(Duration),
    #[error("backend exited with status {status:?}")]
    Failed { status: Option<i32> },
    #[error("backend produced no output at {0}")]
    MissingOutput(PathBuf),
    #[error("backend request failed: {0}")]
    Http(String),
    #[error("backend returned an empty response")]
    EmptyResponse,
    #[error("backend returned invalid json: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("backend error: {0}")]
    Backend(String),
}

/// Uniform tool failure. Tool-internal error types never escape the registry.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool '{name}' not found")]
    NotFound { name: String },
    #[error("tool '{name}' violates the tool contract: {reason}")]
    ContractViolation { name: String, reason: String },
    #[error("tool '{tool_name}' failed: {source:#}")]
    Execution {
        tool_name: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Model output that does not match the action contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("response is not a JSON object")]
    NotAnObject,
    #[error("response has no `action` field")]
    MissingAction,
    #[error("unknown action `{0}`")]
    UnknownAction(String),
    #[error("action `{action}` requires field `{field}`")]
    MissingField {
        action: &'static str,
        field: &'static str,
    },
    #[error("action `{action}` field `{field}` must be {expected}")]
    InvalidField {
        action: &'static str,
        field: &'static str,
        expected: &'static str,
    },
}

/// Failure of a single control-loop turn.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("invalid action: {0}")]
    Validation(#[from] ValidationFailure),
}

impl TurnError {
    /// Both variants are per-turn conditions: the next turn may succeed. The
    /// session driver relies on this and counts every turn error as a retry.
    pub fn is_recoverable(&self) -> bool {
        match self {
            TurnError::Model(_) | TurnError::Validation(_) => true,
        }
    }
}
