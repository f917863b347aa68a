//! Control loop: one model decision and its dispatch per turn.
//!
//! A turn snapshots the plan and memory, renders the prompt, asks the backend
//! for an action, validates it and dispatches it. The agent never changes the
//! plan itself; closing a task is the caller's decision (see
//! [`crate::session`]).

use tracing::{debug, info, instrument, warn};

use crate::core::action::{Action, validate};
use crate::core::memory::{ConversationMemory, Role};
use crate::core::types::StateSnapshot;
use crate::error::TurnError;
use crate::io::backend::ModelBackend;
use crate::io::plan_store::PlanStore;
use crate::io::prompt::render_prompt;
use crate::tools::ToolRegistry;

/// What a successful turn produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// A tool ran. Failures are reported here too, with `succeeded: false`.
    ToolExecuted {
        tool_name: String,
        observation: String,
        succeeded: bool,
    },
    /// The model asked the operator something; the loop is suspended.
    AwaitingUser { question: String },
    /// The model declared the current task done.
    Completed { final_message: String },
}

pub struct Agent<B> {
    store: PlanStore,
    tools: ToolRegistry,
    backend: B,
    memory: ConversationMemory,
}

impl<B: ModelBackend> Agent<B> {
    pub fn new(store: PlanStore, tools: ToolRegistry, backend: B) -> Self {
        Self {
            store,
            tools,
            backend,
            memory: ConversationMemory::new(),
        }
    }

    /// Current task, tools and full memory, recomputed from the plan store.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            current_task: self.store.current_task().task_view(),
            available_tools: self.tools.describe(),
            short_term_memory: self.memory.records().to_vec(),
        }
    }

    /// Run one turn.
    ///
    /// Backend and validation failures are recorded as a `system` observation
    /// and returned; the next turn sees them in memory.
    #[instrument(skip_all, fields(turn_records = self.memory.len()))]
    pub fn run_turn(&mut self) -> Result<TurnOutcome, TurnError> {
        let snapshot = self.snapshot();
        match self.next_action(&snapshot) {
            Ok(action) => Ok(self.dispatch(action)),
            Err(err) => {
                warn!(error = %err, "turn rejected");
                self.memory
                    .push_observation(Role::System, format!("Previous response rejected: {err}"));
                Err(err)
            }
        }
    }

    fn next_action(&self, snapshot: &StateSnapshot) -> Result<Action, TurnError> {
        let prompt = render_prompt(snapshot)?;
        debug!(prompt_bytes = prompt.len(), "prompt rendered");
        let raw = self.backend.get_structured_response(&prompt)?;
        Ok(validate(&raw)?)
    }

    fn dispatch(&mut self, action: Action) -> TurnOutcome {
        info!(action = action.tag(), "dispatching action");
        let outcome = match &action {
            Action::ExecuteTool {
                tool_name,
                parameters,
            } => {
                let (observation, succeeded) = match self.tools.execute(tool_name, parameters) {
                    Ok(output) => (output, true),
                    Err(err) => (format!("Error: {err}"), false),
                };
                TurnOutcome::ToolExecuted {
                    tool_name: tool_name.clone(),
                    observation,
                    succeeded,
                }
            }
            Action::AskUser { question } => TurnOutcome::AwaitingUser {
                question: question.clone(),
            },
            Action::CompleteTask { final_message } => TurnOutcome::Completed {
                final_message: final_message.clone(),
            },
        };

        self.memory.push_action(action);
        if let TurnOutcome::ToolExecuted { observation, .. } = &outcome {
            self.memory.push_observation(Role::Tool, observation.clone());
        }
        outcome
    }

    /// Record the operator's answer so the next turn can see it.
    pub fn record_user_reply(&mut self, answer: impl Into<String>) {
        self.memory.push_observation(Role::User, answer);
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn plan_store(&self) -> &PlanStore {
        &self.store
    }

    pub fn plan_store_mut(&mut self) -> &mut PlanStore {
        &mut self.store
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}
