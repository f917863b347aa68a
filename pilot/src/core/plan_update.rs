//! In-memory status updates applied to the plan.

use crate::plan::{Plan, TaskStatus};

/// Set the status of the first task with `task_id`, scanning the whole plan.
///
/// Unlike selection, this ignores epic and milestone statuses. Returns whether
/// a task was found.
pub fn set_task_status(plan: &mut Plan, task_id: &str, status: TaskStatus) -> bool {
    let task = plan
        .epics
        .iter_mut()
        .flat_map(|epic| &mut epic.milestones)
        .flat_map(|milestone| &mut milestone.features)
        .flat_map(|feature| &mut feature.tasks)
        .find(|task| task.id == task_id);

    match task {
        Some(task) => {
            task.status = status;
            true
        }
        None => false,
    }
}
