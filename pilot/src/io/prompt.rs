//! Prompt rendering for one control-loop turn.

use minijinja::{Environment, context};

use crate::core::types::StateSnapshot;
use crate::error::ModelError;

const AGENT_TEMPLATE: &str = include_str!("prompts/agent.md");

/// Template engine wrapper around minijinja.
struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    fn new() -> Result<Self, ModelError> {
        let mut env = Environment::new();
        env.add_template("agent", AGENT_TEMPLATE)?;
        Ok(Self { env })
    }

    fn render_agent(&self, snapshot: &StateSnapshot) -> Result<String, ModelError> {
        let memory = serde_json::to_string_pretty(&snapshot.short_term_memory)?;
        let template = self.env.get_template("agent")?;
        Ok(template.render(context! {
            task => &snapshot.current_task,
            tools => &snapshot.available_tools,
            memory => memory,
        })?)
    }
}

/// Render the turn prompt. Identical snapshots produce identical prompts.
pub fn render_prompt(snapshot: &StateSnapshot) -> Result<String, ModelError> {
    PromptEngine::new()?.render_agent(snapshot)
}
