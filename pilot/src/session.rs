//! Session driver: run turns until the task closes, the model needs the
//! operator, or a limit is hit.

use anyhow::Result;
use tracing::{info, warn};

use crate::agent::{Agent, TurnOutcome};
use crate::io::backend::ModelBackend;
use crate::io::config::AgentConfig;
use crate::plan::TaskStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub max_turns: u32,
    pub max_consecutive_failures: u32,
    pub complete_task_on_finish: bool,
}

impl From<&AgentConfig> for SessionConfig {
    fn from(cfg: &AgentConfig) -> Self {
        Self {
            max_turns: cfg.max_turns,
            max_consecutive_failures: cfg.max_consecutive_failures,
            complete_task_on_finish: cfg.complete_task_on_finish,
        }
    }
}

/// Reason why `run_session` stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStop {
    /// The plan has no active task.
    NoActiveTask,
    /// The model completed the task; `marked_complete` when the plan was updated.
    Completed {
        task_id: String,
        final_message: String,
        marked_complete: bool,
    },
    /// The model asked the operator a question.
    AwaitingUser { question: String },
    MaxTurnsReached { max_turns: u32 },
    /// Too many rejected turns in a row.
    TooManyFailures { failures: u32, last_error: String },
}

/// Summary of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub turns: u32,
    pub stop: SessionStop,
}

/// Drive `agent` for up to `cfg.max_turns` turns.
///
/// Turn errors are all recoverable: they are counted and the loop continues.
/// A plan write failure while closing the task aborts with `Err`.
pub fn run_session<B: ModelBackend, F: FnMut(&TurnOutcome)>(
    agent: &mut Agent<B>,
    cfg: &SessionConfig,
    mut on_turn: F,
) -> Result<SessionOutcome> {
    let mut turns = 0u32;
    let mut failures = 0u32;

    while turns < cfg.max_turns {
        let current = agent.plan_store().current_task();
        let Some(task_id) = current.task_id().map(str::to_string) else {
            info!(turns, "no active task");
            return Ok(SessionOutcome {
                turns,
                stop: SessionStop::NoActiveTask,
            });
        };

        turns += 1;
        let outcome = match agent.run_turn() {
            Ok(outcome) => outcome,
            Err(err) => {
                failures += 1;
                warn!(turn = turns, failures, error = %err, "turn failed");
                if failures >= cfg.max_consecutive_failures {
                    return Ok(SessionOutcome {
                        turns,
                        stop: SessionStop::TooManyFailures {
                            failures,
                            last_error: err.to_string(),
                        },
                    });
                }
                continue;
            }
        };
        failures = 0;
        on_turn(&outcome);

        match outcome {
            TurnOutcome::ToolExecuted { .. } => {}
            TurnOutcome::AwaitingUser { question } => {
                return Ok(SessionOutcome {
                    turns,
                    stop: SessionStop::AwaitingUser { question },
                });
            }
            TurnOutcome::Completed { final_message } => {
                let marked_complete = cfg.complete_task_on_finish
                    && agent
                        .plan_store_mut()
                        .update_task_status(&task_id, TaskStatus::Completed)?;
                info!(%task_id, marked_complete, "task completed");
                return Ok(SessionOutcome {
                    turns,
                    stop: SessionStop::Completed {
                        task_id,
                        final_message,
                        marked_complete,
                    },
                });
            }
        }
    }

    warn!(max_turns = cfg.max_turns, "turn limit reached");
    Ok(SessionOutcome {
        turns,
        stop: SessionStop::MaxTurnsReached {
            max_turns: cfg.max_turns,
        },
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::io::plan_store::PlanStore;
    use crate::test_support::{EchoTool, ScriptedBackend, single_task_plan, write_plan_file};
    use crate::tools::ToolRegistry;

    const CFG: SessionConfig = SessionConfig {
        max_turns: 5,
        max_consecutive_failures: 2,
        complete_task_on_finish: true,
    };

    fn agent<'a>(
        dir: &std::path::Path,
        task_status: &str,
        backend: &'a ScriptedBackend,
    ) -> Agent<&'a ScriptedBackend> {
        let path = write_plan_file(dir, &single_task_plan(task_status, "Implement X"));
        let mut tools = ToolRegistry::new();
        tools.register("echo", || Ok(EchoTool)).expect("register");
        Agent::new(PlanStore::open(path).expect("store"), tools, backend)
    }

    fn echo() -> serde_json::Value {
        json!({"action": "execute_tool", "tool_name": "echo", "parameters": {"text": "x"}})
    }

    #[test]
    fn stops_before_any_turn_without_active_task() {
        let temp = tempfile::tempdir().expect("tempdir");
        let backend = ScriptedBackend::new(vec![echo()]);
        let mut agent = agent(temp.path(), "Completed", &backend);

        let outcome = run_session(&mut agent, &CFG, |_| {}).expect("session");

        assert_eq!(outcome.turns, 0);
        assert_eq!(outcome.stop, SessionStop::NoActiveTask);
        assert_eq!(backend.remaining(), 1);
    }

    #[test]
    fn completion_marks_the_task_done() {
        let temp = tempfile::tempdir().expect("tempdir");
        let backend = ScriptedBackend::new(vec![
            echo(),
            json!({"action": "complete_task", "final_message": "shipped"}),
        ]);
        let mut agent = agent(temp.path(), "Ready", &backend);
        let mut seen = 0;

        let outcome = run_session(&mut agent, &CFG, |_| seen += 1).expect("session");

        assert_eq!(seen, 2);
        assert_eq!(
            outcome,
            SessionOutcome {
                turns: 2,
                stop: SessionStop::Completed {
                    task_id: "T1".to_string(),
                    final_message: "shipped".to_string(),
                    marked_complete: true,
                },
            }
        );
        let reopened = PlanStore::open(agent.plan_store().path()).expect("reopen");
        let task = reopened
            .plan()
            .and_then(|plan| plan.find_task("T1"))
            .expect("task");
        assert_eq!(task.status, TaskStatus::Completed);
    }

    #[test]
    fn completion_can_leave_the_plan_alone() {
        let temp = tempfile::tempdir().expect("tempdir");
        let backend =
            ScriptedBackend::new(vec![json!({"action": "complete_task", "final_message": "ok"})]);
        let mut agent = agent(temp.path(), "Ready", &backend);
        let cfg = SessionConfig {
            complete_task_on_finish: false,
            ..CFG
        };

        let outcome = run_session(&mut agent, &cfg, |_| {}).expect("session");

        assert!(matches!(
            outcome.stop,
            SessionStop::Completed {
                marked_complete: false,
                ..
            }
        ));
        assert_eq!(agent.plan_store().current_task().task_id(), Some("T1"));
    }

    #[test]
    fn ask_user_suspends_the_session() {
        let temp = tempfile::tempdir().expect("tempdir");
        let backend =
            ScriptedBackend::new(vec![json!({"action": "ask_user", "question": "Name?"})]);
        let mut agent = agent(temp.path(), "In Progress", &backend);

        let outcome = run_session(&mut agent, &CFG, |_| {}).expect("session");

        assert_eq!(
            outcome.stop,
            SessionStop::AwaitingUser {
                question: "Name?".to_string()
            }
        );
    }

    #[test]
    fn turn_limit_stops_a_busy_model() {
        let temp = tempfile::tempdir().expect("tempdir");
        let backend = ScriptedBackend::new(vec![echo(); 10]);
        let mut agent = agent(temp.path(), "Ready", &backend);

        let outcome = run_session(&mut agent, &CFG, |_| {}).expect("session");

        assert_eq!(outcome.turns, 5);
        assert_eq!(outcome.stop, SessionStop::MaxTurnsReached { max_turns: 5 });
        assert_eq!(agent.memory().len(), 10);
    }

    #[test]
    fn consecutive_failures_end_the_session() {
        let temp = tempfile::tempdir().expect("tempdir");
        let backend =
            ScriptedBackend::new(vec![json!("not an object"), json!({"action": "dance"})]);
        let mut agent = agent(temp.path(), "Ready", &backend);

        let outcome = run_session(&mut agent, &CFG, |_| {}).expect("session");

        assert_eq!(outcome.turns, 2);
        assert!(matches!(
            outcome.stop,
            SessionStop::TooManyFailures { failures: 2, ref last_error }
                if last_error.contains("dance")
        ));
    }

    #[test]
    fn a_good_turn_resets_the_failure_count() {
        let temp = tempfile::tempdir().expect("tempdir");
        let backend = ScriptedBackend::new(vec![
            json!({"action": "dance"}),
            echo(),
            json!({"action": "dance"}),
            json!({"action": "complete_task", "final_message": "ok"}),
        ]);
        let mut agent = agent(temp.path(), "Ready", &backend);

        let outcome = run_session(&mut agent, &CFG, |_| {}).expect("session");

        assert_eq!(outcome.turns, 4);
        assert!(matches!(outcome.stop, SessionStop::Completed { .. }));
    }
}
