//! `pilot`: drive a model through the active task of a project plan.
//!
//! With no subcommand, runs a session: the model picks actions for the
//! current task until it completes the task, asks a question (answered on
//! stdin) or hits a limit.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use pilot::agent::{Agent, TurnOutcome};
use pilot::core::invariants::validate_invariants;
use pilot::core::types::{CurrentTask, NO_CURRENT_TASK_TITLE};
use pilot::exit_codes;
use pilot::io::backend::{CodexBackend, HubInferenceBackend, ModelBackend};
use pilot::io::config::{AppConfig, BackendKind, DEFAULT_CONFIG_PATH, Settings};
use pilot::io::plan_store::PlanStore;
use pilot::logging;
use pilot::plan::TaskStatus;
use pilot::session::{SessionConfig, SessionStop, run_session};
use pilot::tools::default_registry;

#[derive(Parser)]
#[command(name = "pilot", version, about = "Plan-driven autonomous agent")]
struct Cli {
    /// Settings file (TOML).
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the agent on the active task (default).
    Run,
    /// Print the active task id and title.
    Current,
    /// Set a task's status, e.g. `pilot status T-1 "In Progress"`.
    Status { task_id: String, status: String },
    /// List the registered tools.
    Tools,
    /// Check the plan file against the schema and id invariants.
    Validate,
}

fn main() {
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            logging::init_fallback();
            error!(error = %format!("{err:#}"), "pilot failed");
            eprintln!("error: {err:#}");
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let settings = Settings::load(&cli.config)?;
    let cfg = AppConfig::from_settings(&settings)?;
    logging::init(&cfg.logging)?;
    info!(config = %cli.config.display(), "settings loaded");

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => cmd_run(&cfg),
        Command::Current => cmd_current(&cfg),
        Command::Status { task_id, status } => cmd_status(&cfg, &task_id, status.into()),
        Command::Tools => cmd_tools(&cfg),
        Command::Validate => cmd_validate(&cfg),
    }
}

fn open_plan(cfg: &AppConfig) -> Result<PlanStore> {
    let store = PlanStore::open_default(cfg)?;
    info!(path = %store.path().display(), "plan opened");
    Ok(store)
}

fn cmd_current(cfg: &AppConfig) -> Result<i32> {
    match open_plan(cfg)?.current_task() {
        CurrentTask::Active(found) => {
            println!("{}\t{}", found.task.id, found.task.title);
            Ok(exit_codes::OK)
        }
        CurrentTask::NoneFound => {
            println!("{NO_CURRENT_TASK_TITLE}");
            Ok(exit_codes::NO_TASK)
        }
    }
}

fn cmd_status(cfg: &AppConfig, task_id: &str, status: TaskStatus) -> Result<i32> {
    let mut store = open_plan(cfg)?;
    if let Some(err) = store.load_error() {
        return Err(anyhow!("{err}"));
    }
    if store.update_task_status(task_id, status.clone())? {
        println!("{task_id}: {status}");
        Ok(exit_codes::OK)
    } else {
        eprintln!("unknown task id '{task_id}'");
        Ok(exit_codes::INVALID)
    }
}

fn cmd_tools(cfg: &AppConfig) -> Result<i32> {
    for tool in default_registry(cfg)?.describe() {
        println!("{}\t{}", tool.name, tool.description);
    }
    Ok(exit_codes::OK)
}

fn cmd_validate(cfg: &AppConfig) -> Result<i32> {
    let store = open_plan(cfg)?;
    let Some(plan) = store.plan() else {
        let reason = store
            .load_error()
            .map(ToString::to_string)
            .unwrap_or_default();
        eprintln!("{reason}");
        return Ok(exit_codes::INVALID);
    };
    let violations = validate_invariants(plan);
    if !violations.is_empty() {
        eprintln!("invariant violations:\n- {}", violations.join("\n- "));
        return Ok(exit_codes::INVALID);
    }
    println!("ok: {}", store.path().display());
    Ok(exit_codes::OK)
}

fn build_backend(cfg: &AppConfig) -> Result<Box<dyn ModelBackend>> {
    Ok(match cfg.backend.kind {
        BackendKind::Codex => Box::new(CodexBackend::new(&cfg.backend, &cfg.tools.workdir)?),
        BackendKind::Hub => {
            let token = cfg.require_hub_token()?;
            Box::new(HubInferenceBackend::new(&cfg.backend, Some(token))?)
        }
    })
}

fn cmd_run(cfg: &AppConfig) -> Result<i32> {
    let backend = build_backend(cfg)?;
    let tools = default_registry(cfg)?;
    let mut agent = Agent::new(open_plan(cfg)?, tools, backend);
    let session_cfg = SessionConfig::from(&cfg.agent);
    let mut stdin = io::stdin().lock();

    loop {
        let outcome = run_session(&mut agent, &session_cfg, print_turn)?;
        match outcome.stop {
            SessionStop::NoActiveTask => {
                println!("{NO_CURRENT_TASK_TITLE}");
                return Ok(exit_codes::OK);
            }
            SessionStop::Completed {
                task_id,
                final_message,
                marked_complete,
            } => {
                let suffix = if marked_complete { " (marked Completed)" } else { "" };
                println!("{task_id} done{suffix}: {final_message}");
                return Ok(exit_codes::OK);
            }
            SessionStop::MaxTurnsReached { max_turns } => {
                warn!(max_turns, "session ended at the turn limit");
                println!("stopped after {max_turns} turns");
                return Ok(exit_codes::OK);
            }
            SessionStop::TooManyFailures {
                failures,
                last_error,
            } => {
                return Err(anyhow!(
                    "{failures} consecutive failed turns; last: {last_error}"
                ));
            }
            SessionStop::AwaitingUser { question } => {
                print!("{question}\n> ");
                io::stdout().flush().context("flush stdout")?;
                let mut answer = String::new();
                if stdin.read_line(&mut answer).context("read answer")? == 0 {
                    info!("stdin closed, ending session");
                    return Ok(exit_codes::OK);
                }
                agent.record_user_reply(answer.trim_end());
            }
        }
    }
}

fn print_turn(outcome: &TurnOutcome) {
    if let TurnOutcome::ToolExecuted {
        tool_name,
        observation,
        ..
    } = outcome
    {
        println!("[{tool_name}] {observation}");
    }
}
