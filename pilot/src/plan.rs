//! Plan data model: `Epic → Milestone → Feature → Task`.
//!
//! Unknown fields on any node are kept in `extra` so a whole-file rewrite does
//! not drop data the runtime does not understand.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const DEFAULT_PLAN: &str = include_str!("../assets/default_plan.json");

/// Status of a plan node.
///
/// Values other than the three the runtime acts on are carried through
/// unchanged as [`TaskStatus::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    Ready,
    InProgress,
    Completed,
    Other(String),
}

impl TaskStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Ready => "Ready",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Completed => "Completed",
            TaskStatus::Other(raw) => raw,
        }
    }

    /// True for statuses the selector treats as workable.
    pub fn is_open(&self) -> bool {
        matches!(self, TaskStatus::Ready | TaskStatus::InProgress)
    }
}

impl From<String> for TaskStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "Ready" => TaskStatus::Ready,
            "In Progress" => TaskStatus::InProgress,
            "Completed" => TaskStatus::Completed,
            _ => TaskStatus::Other(raw),
        }
    }
}

impl From<&str> for TaskStatus {
    fn from(raw: &str) -> Self {
        TaskStatus::from(raw.to_string())
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub project_name: String,
    #[serde(default)]
    pub epics: Vec<Epic>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Epic {
    pub id: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub status: TaskStatus,
    pub title: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Plan {
    /// Plan with no epics, used when no packaged default is available.
    pub fn empty(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            epics: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Iterate every task in stored order, ignoring statuses.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.epics
            .iter()
            .flat_map(|epic| &epic.milestones)
            .flat_map(|milestone| &milestone.features)
            .flat_map(|feature| &feature.tasks)
    }

    pub fn find_task(&self, task_id: &str) -> Option<&Task> {
        self.tasks().find(|task| task.id == task_id)
    }
}

/// Packaged default plan contents (JSON text).
pub fn default_plan_json() -> &'static str {
    DEFAULT_PLAN
}
