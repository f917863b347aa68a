//! Tools the model can invoke through `execute_tool` actions.
//!
//! Every tool implements [`Tool`] and is reached only through the
//! [`ToolRegistry`], which turns tool-specific failures into
//! [`crate::error::ToolError`].

mod file_system;
mod git_clone;
mod hub;
mod registry;

use serde_json::Value;

use crate::core::action::Parameters;
use crate::io::config::AppConfig;

pub use file_system::{FileSystemError, FileSystemTool, PLACEHOLDER_BODY};
pub use git_clone::{GitCloneError, GitCloneTool};
pub use hub::{CreateRepoRequest, HttpHubApi, HubApi, HubError, HubTool, RepoType};
pub use registry::ToolRegistry;

pub const FILE_SYSTEM_TOOL: &str = "file_system_manager";
pub const GIT_TOOL: &str = "git_client";
pub const HUB_TOOL: &str = "huggingface_hub";

/// A named capability with a single entry point.
pub trait Tool {
    /// One line shown to the model next to the tool name.
    fn description(&self) -> &str;

    /// Run with the model-supplied parameters and return a human-readable result.
    fn run(&self, parameters: &Parameters) -> anyhow::Result<String>;
}

/// Register the built-in tools, configured from `cfg`.
pub fn default_registry(cfg: &AppConfig) -> Result<ToolRegistry, crate::error::ToolError> {
    let mut registry = ToolRegistry::new();
    let workdir = cfg.tools.workdir.clone();
    registry.register(FILE_SYSTEM_TOOL, || Ok(FileSystemTool::new(workdir)))?;
    registry.register(GIT_TOOL, || Ok(GitCloneTool::from_config(&cfg.tools)))?;
    registry.register(HUB_TOOL, || {
        Ok(HubTool::new(HttpHubApi::new(&cfg.hub.endpoint), cfg.hub_token()))
    })?;
    Ok(registry)
}

/// Non-empty string parameter, if present.
fn str_param<'a>(parameters: &'a Parameters, key: &str) -> Option<&'a str> {
    parameters
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
