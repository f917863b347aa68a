//! Shared deterministic types for the control loop and plan queries.
//!
//! These are read-only projections recomputed on demand; none of them are
//! persisted.

use serde::Serialize;

use crate::core::memory::MemoryRecord;
use crate::plan::{Task, TaskStatus};

/// Title reported when the plan has no active task.
pub const NO_CURRENT_TASK_TITLE: &str = "No current task found.";

/// Location of the active task inside the plan.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveTaskRef {
    pub epic_id: String,
    pub milestone_id: String,
    pub task: Task,
}

/// Result of an active-task query.
#[derive(Debug, Clone, PartialEq)]
pub enum CurrentTask {
    Active(ActiveTaskRef),
    /// Sentinel: no epic/milestone/task satisfied the selection chain.
    NoneFound,
}

impl CurrentTask {
    pub fn active(&self) -> Option<&ActiveTaskRef> {
        match self {
            CurrentTask::Active(found) => Some(found),
            CurrentTask::NoneFound => None,
        }
    }

    pub fn task_id(&self) -> Option<&str> {
        self.active().map(|found| found.task.id.as_str())
    }

    pub fn title(&self) -> &str {
        self.active()
            .map(|found| found.task.title.as_str())
            .unwrap_or(NO_CURRENT_TASK_TITLE)
    }

    /// Task view embedded in state snapshots (`id: null` for the sentinel).
    pub fn task_view(&self) -> TaskView {
        TaskView {
            id: self.task_id().map(str::to_string),
            title: self.title().to_string(),
            status: self.active().map(|found| found.task.status.clone()),
        }
    }
}

/// Serializable task projection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskView {
    pub id: Option<String>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
}

/// Name and description of a registered tool, as shown to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolSummary {
    pub name: String,
    pub description: String,
}

/// Per-turn state handed to prompt construction.
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub current_task: TaskView,
    pub available_tools: Vec<ToolSummary>,
    pub short_term_memory: Vec<MemoryRecord>,
}
