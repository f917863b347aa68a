//! Plan persistence: resolve, seed, load and rewrite the plan file.
//!
//! A plan that cannot be read or parsed does not fail construction. The store
//! keeps a [`PlanLoadError`] instead, and queries on it report no active task.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use jsonschema::validator_for;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::core::invariants::validate_invariants;
use crate::core::plan_update::set_task_status;
use crate::core::selector::current_task;
use crate::core::types::CurrentTask;
use crate::io::config::AppConfig;
use crate::plan::{Plan, TaskStatus, default_plan_json};

const PLAN_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../schemas/plan/v1.schema.json"
));

const PLAN_FILE_NAME: &str = "plan.json";
const FALLBACK_PLAN_PATH: &str = ".taskpilot/plan.json";

/// Why the plan file could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanLoadError {
    #[error("read plan {path}: {reason}")]
    Read { path: PathBuf, reason: String },
    #[error("invalid JSON in plan {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
    #[error("plan {path} does not match schema: {reason}")]
    Schema { path: PathBuf, reason: String },
}

/// Loaded plan, or the in-band error marker for a broken file.
#[derive(Debug, Clone)]
pub enum PlanState {
    Loaded(Plan),
    Broken(PlanLoadError),
}

/// Sole owner of the plan. All mutations go through [`PlanStore::update_task_status`].
#[derive(Debug)]
pub struct PlanStore {
    path: PathBuf,
    state: PlanState,
}

impl PlanStore {
    /// Open the plan at `path`, seeding it from the packaged default if absent.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with_seed(path, Some(default_plan_json()))
    }

    /// Open the plan at `path`, seeding it from `seed` if absent.
    ///
    /// With no seed, an empty `{project_name, epics: []}` plan is written.
    /// Directory creation and seeding failures are returned; load failures are
    /// recorded in the store.
    #[instrument(skip_all, fields(path = tracing::field::Empty))]
    pub fn open_with_seed(path: impl Into<PathBuf>, seed: Option<&str>) -> Result<Self> {
        let path = path.into();
        tracing::Span::current().record("path", tracing::field::display(path.display()));

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create plan directory {}", parent.display()))?;
        }
        if !path.exists() {
            seed_plan(&path, seed)?;
        }

        let state = load_plan(&path);
        if let PlanState::Broken(err) = &state {
            warn!(error = %err, "plan failed to load; no task will be active");
        }
        Ok(Self { path, state })
    }

    /// Open the plan at the configured location.
    pub fn open_default(cfg: &AppConfig) -> Result<Self> {
        Self::open(resolve_plan_path(cfg))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &PlanState {
        &self.state
    }

    pub fn plan(&self) -> Option<&Plan> {
        match &self.state {
            PlanState::Loaded(plan) => Some(plan),
            PlanState::Broken(_) => None,
        }
    }

    pub fn load_error(&self) -> Option<&PlanLoadError> {
        match &self.state {
            PlanState::Loaded(_) => None,
            PlanState::Broken(err) => Some(err),
        }
    }

    /// Re-read the plan file, replacing the in-memory state.
    pub fn reload(&mut self) {
        self.state = load_plan(&self.path);
    }

    /// The single active task, or the sentinel when none (or the plan is broken).
    pub fn current_task(&self) -> CurrentTask {
        match &self.state {
            PlanState::Loaded(plan) => current_task(plan),
            PlanState::Broken(_) => CurrentTask::NoneFound,
        }
    }

    /// Set a task's status anywhere in the plan and persist the whole plan.
    ///
    /// Returns `Ok(false)` without writing when no task has `task_id` or the
    /// plan is broken. The in-memory plan only changes once the write succeeds.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn update_task_status(&mut self, task_id: &str, status: TaskStatus) -> Result<bool> {
        let PlanState::Loaded(plan) = &mut self.state else {
            warn!("refusing to update a plan that failed to load");
            return Ok(false);
        };
        let mut updated = plan.clone();
        if !set_task_status(&mut updated, task_id, status.clone()) {
            debug!("task not found");
            return Ok(false);
        }
        write_plan(&self.path, &updated)?;
        *plan = updated;
        info!(%status, "task status updated");
        Ok(true)
    }
}

/// Plan location: `plan.path`, else the platform data directory, else
/// `.taskpilot/plan.json` under the working directory.
pub fn resolve_plan_path(cfg: &AppConfig) -> PathBuf {
    if let Some(path) = &cfg.plan.path {
        return path.clone();
    }
    ProjectDirs::from("", "", "taskpilot")
        .map(|dirs| dirs.data_dir().join(PLAN_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(FALLBACK_PLAN_PATH))
}

/// Write the plan with pretty formatting and a trailing newline.
pub fn write_plan(path: &Path, plan: &Plan) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(plan).context("serialize plan")?;
    buf.push('\n');
    fs::write(path, buf).with_context(|| format!("write plan {}", path.display()))
}

/// Parse and check a plan file: JSON, schema, then the typed model.
pub fn load_plan(path: &Path) -> PlanState {
    match read_plan(path) {
        Ok(plan) => {
            for violation in validate_invariants(&plan) {
                warn!(path = %path.display(), %violation, "plan invariant violated");
            }
            PlanState::Loaded(plan)
        }
        Err(err) => PlanState::Broken(err),
    }
}

fn read_plan(path: &Path) -> Result<Plan, PlanLoadError> {
    let contents = fs::read_to_string(path).map_err(|err| PlanLoadError::Read {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    let value: Value = serde_json::from_str(&contents).map_err(|err| PlanLoadError::Parse {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    validate_schema(&value).map_err(|err| PlanLoadError::Schema {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    serde_json::from_value(value).map_err(|err| PlanLoadError::Schema {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })
}

fn seed_plan(path: &Path, seed: Option<&str>) -> Result<()> {
    match seed {
        Some(contents) => {
            info!(path = %path.display(), "seeding plan from packaged default");
            fs::write(path, contents).with_context(|| format!("seed plan {}", path.display()))
        }
        None => {
            info!(path = %path.display(), "no default plan; writing an empty plan");
            write_plan(path, &Plan::empty(default_project_name(path)))
        }
    }
}

fn default_project_name(path: &Path) -> String {
    path.parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "untitled".to_string())
}

fn validate_schema(plan: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(PLAN_SCHEMA).context("parse plan schema")?;
    let compiled = validator_for(&schema).map_err(|err| anyhow!("invalid schema: {}", err))?;
    let messages = compiled
        .iter_errors(plan)
        .map(|err| err.to_string())
        .collect::<Vec<_>>();
    if !messages.is_empty() {
        return Err(anyhow!("{}", messages.join("; ")));
    }
    Ok(())
}
