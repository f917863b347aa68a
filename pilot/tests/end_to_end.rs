//! Library-level scenarios: a scripted model drives real tools against a
//! plan file in a temp directory.

use std::fs;

use serde_json::json;

use pilot::agent::{Agent, TurnOutcome};
use pilot::core::memory::Role;
use pilot::io::config::{AppConfig, Settings};
use pilot::io::plan_store::PlanStore;
use pilot::plan::TaskStatus;
use pilot::session::{SessionConfig, SessionStop, run_session};
use pilot::test_support::{ScriptedBackend, single_task_plan, write_plan_file};
use pilot::tools::{FILE_SYSTEM_TOOL, PLACEHOLDER_BODY, default_registry};

fn config_for(workdir: &std::path::Path) -> AppConfig {
    let settings: Settings = format!(
        "[tools]\nworkdir = {:?}\n[hub]\ntoken_env = \"PILOT_E2E_UNSET_TOKEN\"\n",
        workdir.display().to_string()
    )
    .parse()
    .expect("settings");
    AppConfig::from_settings(&settings).expect("config")
}

#[test]
fn one_tool_turn_creates_the_file_and_leaves_the_plan() {
    let temp = tempfile::tempdir().expect("tempdir");
    let plan_path = write_plan_file(temp.path(), &single_task_plan("Ready", "Implement X"));
    let plan_before = fs::read_to_string(&plan_path).expect("read plan");
    let cfg = config_for(temp.path());
    let backend = ScriptedBackend::new(vec![json!({
        "action": "execute_tool",
        "tool_name": FILE_SYSTEM_TOOL,
        "parameters": {"file_path": "out.txt"}
    })]);
    let mut agent = Agent::new(
        PlanStore::open(&plan_path).expect("store"),
        default_registry(&cfg).expect("registry"),
        &backend,
    );

    let outcome = agent.run_turn().expect("turn");

    assert_eq!(
        outcome,
        TurnOutcome::ToolExecuted {
            tool_name: FILE_SYSTEM_TOOL.to_string(),
            observation: "Successfully created file: out.txt".to_string(),
            succeeded: true,
        }
    );
    assert_eq!(
        fs::read_to_string(temp.path().join("out.txt")).expect("out.txt"),
        PLACEHOLDER_BODY
    );
    let records = agent.memory().records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].role, Role::Assistant);
    assert_eq!(records[1].role, Role::Tool);
    assert_eq!(fs::read_to_string(&plan_path).expect("read plan"), plan_before);
    assert!(backend.prompts()[0].contains("Implement X"));
}

#[test]
fn session_works_a_task_to_completion() {
    let temp = tempfile::tempdir().expect("tempdir");
    let plan_path = write_plan_file(temp.path(), &single_task_plan("Ready", "Write docs"));
    let cfg = config_for(temp.path());
    let backend = ScriptedBackend::new(vec![
        json!({"action": "ask_user", "question": "Which file?"}),
        json!({
            "action": "execute_tool",
            "tool_name": FILE_SYSTEM_TOOL,
            "parameters": {"file_path": "docs/README.md"}
        }),
        json!({"action": "complete_task", "final_message": "Docs written."}),
    ]);
    let mut agent = Agent::new(
        PlanStore::open(&plan_path).expect("store"),
        default_registry(&cfg).expect("registry"),
        &backend,
    );
    let session_cfg = SessionConfig::from(&cfg.agent);

    let first = run_session(&mut agent, &session_cfg, |_| {}).expect("first session");
    assert_eq!(
        first.stop,
        SessionStop::AwaitingUser {
            question: "Which file?".to_string()
        }
    );

    agent.record_user_reply("docs/README.md");
    let second = run_session(&mut agent, &session_cfg, |_| {}).expect("second session");

    assert_eq!(second.turns, 2);
    assert!(matches!(second.stop, SessionStop::Completed { marked_complete: true, .. }));
    assert!(temp.path().join("docs/README.md").is_file());
    assert!(backend.prompts()[1].contains("docs/README.md"));

    let reopened = PlanStore::open(&plan_path).expect("reopen");
    let task = reopened.plan().and_then(|plan| plan.find_task("T1")).expect("task");
    assert_eq!(task.status, TaskStatus::Completed);
    assert!(reopened.current_task().active().is_none());
}

#[test]
fn default_tools_are_registered_in_order() {
    let temp = tempfile::tempdir().expect("tempdir");
    let registry = default_registry(&config_for(temp.path())).expect("registry");
    assert_eq!(
        registry.list(),
        vec!["file_system_manager", "git_client", "huggingface_hub"]
    );
}
