use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;

use anyhow::anyhow;
use tracing::{info, warn};

use super::Tool;
use crate::core::action::Parameters;
use crate::core::types::ToolSummary;
use crate::error::ToolError;

/// Name-keyed tool instances in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<(String, Box<dyn Tool>)>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.list())
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct a tool with `factory` and store it under `name`.
    ///
    /// Empty and duplicate names are rejected, as is a factory that fails.
    pub fn register<T, F>(&mut self, name: &str, factory: F) -> Result<(), ToolError>
    where
        T: Tool + 'static,
        F: FnOnce() -> anyhow::Result<T>,
    {
        let violation = |reason: String| ToolError::ContractViolation {
            name: name.to_string(),
            reason,
        };
        if name.trim().is_empty() {
            return Err(violation("tool name is empty".to_string()));
        }
        if self.get(name).is_some() {
            return Err(violation("a tool with this name is already registered".to_string()));
        }
        let tool = factory().map_err(|err| violation(format!("construction failed: {err:#}")))?;
        let tool: Box<dyn Tool> = Box::new(tool);
        self.tools.push((name.to_string(), tool));
        Ok(())
    }

    pub fn list(&self) -> Vec<String> {
        self.tools.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn describe(&self) -> Vec<ToolSummary> {
        self.tools
            .iter()
            .map(|(name, tool)| ToolSummary {
                name: name.clone(),
                description: tool.description().to_string(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|(registered, _)| registered == name)
            .map(|(_, tool)| tool.as_ref())
    }

    /// Run the named tool. Errors and panics inside the tool become
    /// [`ToolError::Execution`].
    pub fn execute(&self, name: &str, parameters: &Parameters) -> Result<String, ToolError> {
        let tool = self.get(name).ok_or_else(|| ToolError::NotFound {
            name: name.to_string(),
        })?;

        let started = Instant::now();
        let result = catch_unwind(AssertUnwindSafe(|| tool.run(parameters)))
            .unwrap_or_else(|payload| Err(anyhow!("tool panicked: {}", panic_message(&*payload))));
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(output) => {
                info!(tool_name = name, elapsed_ms, "tool ok");
                Ok(output)
            }
            Err(source) => {
                warn!(tool_name = name, elapsed_ms, error = %format!("{source:#}"), "tool failed");
                Err(ToolError::Execution {
                    tool_name: name.to_string(),
                    source,
                })
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;
    use crate::test_support::{EchoTool, FailingTool, params};

    struct PanickingTool;

    impl Tool for PanickingTool {
        fn description(&self) -> &str {
            "Always panics."
        }

        fn run(&self, _parameters: &Parameters) -> anyhow::Result<String> {
            panic!("boom");
        }
    }

    #[test]
    fn lists_in_registration_order() {
        let mut registry = ToolRegistry::new();
        registry.register("zeta", || Ok(EchoTool)).expect("zeta");
        registry.register("alpha", || Ok(EchoTool)).expect("alpha");

        assert_eq!(registry.list(), vec!["zeta", "alpha"]);
        assert_eq!(registry.describe()[1].description, EchoTool.description());
    }

    #[test]
    fn rejects_duplicate_empty_and_failed_registrations() {
        let mut registry = ToolRegistry::new();
        registry.register("echo", || Ok(EchoTool)).expect("first");

        assert!(matches!(
            registry.register("echo", || Ok(EchoTool)),
            Err(ToolError::ContractViolation { .. })
        ));
        assert!(matches!(
            registry.register("  ", || Ok(EchoTool)),
            Err(ToolError::ContractViolation { .. })
        ));
        let err = registry
            .register::<EchoTool, _>("broken", || Err(anyhow!("no credentials")))
            .unwrap_err();
        assert!(err.to_string().contains("no credentials"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unknown_tool_is_not_found() {
        let registry = ToolRegistry::new();
        let err = registry.execute("missing", &params(&[])).unwrap_err();
        assert!(matches!(err, ToolError::NotFound { ref name } if name == "missing"));
        assert_eq!(err.to_string(), "tool 'missing' not found");
    }

    #[test]
    fn tool_errors_are_wrapped_with_cause() {
        let mut registry = ToolRegistry::new();
        registry.register("fails", || Ok(FailingTool)).expect("register");

        let err = registry.execute("fails", &params(&[])).unwrap_err();
        assert!(matches!(err, ToolError::Execution { ref tool_name, .. } if tool_name == "fails"));
        assert!(err.to_string().contains(FailingTool::MESSAGE));
        assert!(err.source().is_some());
    }

    #[test]
    fn panics_are_contained() {
        let mut registry = ToolRegistry::new();
        registry.register("panics", || Ok(PanickingTool)).expect("register");

        let err = registry.execute("panics", &params(&[])).unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn successful_run_returns_output() {
        let mut registry = ToolRegistry::new();
        registry.register("echo", || Ok(EchoTool)).expect("register");

        let out = registry
            .execute("echo", &params(&[("text", "hello")]))
            .expect("run");
        assert_eq!(out, "echo: hello");
    }
}
