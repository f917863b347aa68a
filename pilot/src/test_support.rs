//! Test-only builders for plans, tools and scripted backends.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use anyhow::anyhow;
use serde_json::{Map, Value};

use crate::core::action::Parameters;
use crate::error::ModelError;
use crate::io::backend::ModelBackend;
use crate::io::plan_store::write_plan;
use crate::plan::{Epic, Feature, Milestone, Plan, Task};
use crate::tools::Tool;

pub fn plan(epics: Vec<Epic>) -> Plan {
    Plan {
        epics,
        ..Plan::empty("test-project")
    }
}

pub fn epic(id: &str, status: &str, milestones: Vec<Milestone>) -> Epic {
    Epic {
        id: id.to_string(),
        status: status.into(),
        title: None,
        milestones,
        extra: Map::new(),
    }
}

pub fn milestone(id: &str, status: &str, features: Vec<Feature>) -> Milestone {
    Milestone {
        id: id.to_string(),
        status: status.into(),
        title: None,
        features,
        extra: Map::new(),
    }
}

pub fn feature(id: &str, tasks: Vec<Task>) -> Feature {
    Feature {
        id: id.to_string(),
        status: None,
        title: None,
        tasks,
        extra: Map::new(),
    }
}

pub fn task(id: &str, status: &str, title: &str) -> Task {
    Task {
        id: id.to_string(),
        status: status.into(),
        title: title.to_string(),
        extra: Map::new(),
    }
}

/// `E1 / M1 / F1 / T1`, all in progress except the task.
pub fn single_task_plan(task_status: &str, title: &str) -> Plan {
    plan(vec![epic(
        "E1",
        "In Progress",
        vec![milestone(
            "M1",
            "In Progress",
            vec![feature("F1", vec![task("T1", task_status, title)])],
        )],
    )])
}

/// Write `plan` to `dir/plan.json` and return the path.
pub fn write_plan_file(dir: &Path, plan: &Plan) -> PathBuf {
    let path = dir.join("plan.json");
    write_plan(&path, plan).expect("write plan fixture");
    path
}

/// Tool parameters from string pairs.
pub fn params(pairs: &[(&str, &str)]) -> Parameters {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), Value::String(value.to_string())))
        .collect()
}

/// Returns `echo: <text>`.
pub struct EchoTool;

impl Tool for EchoTool {
    fn description(&self) -> &str {
        "Echo the `text` parameter."
    }

    fn run(&self, parameters: &Parameters) -> anyhow::Result<String> {
        let text = parameters.get("text").and_then(Value::as_str).unwrap_or_default();
        Ok(format!("echo: {text}"))
    }
}

/// Always fails with [`FailingTool::MESSAGE`].
pub struct FailingTool;

impl FailingTool {
    pub const MESSAGE: &'static str = "disk on fire";
}

impl Tool for FailingTool {
    fn description(&self) -> &str {
        "Always fails."
    }

    fn run(&self, _parameters: &Parameters) -> anyhow::Result<String> {
        Err(anyhow!(Self::MESSAGE))
    }
}

/// Backend that replays canned responses and records every prompt.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    responses: RefCell<VecDeque<Result<Value, ModelError>>>,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new(responses: Vec<Value>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    pub fn with_results(results: Vec<Result<Value, ModelError>>) -> Self {
        Self {
            responses: RefCell::new(results.into()),
            prompts: RefCell::default(),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }

    pub fn remaining(&self) -> usize {
        self.responses.borrow().len()
    }
}

impl ModelBackend for ScriptedBackend {
    fn get_structured_response(&self, prompt: &str) -> Result<Value, ModelError> {
        self.prompts.borrow_mut().push(prompt.to_string());
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::Backend("script exhausted".to_string())))
    }
}
