//! Deterministic active-task selection for the plan.

use crate::core::types::{ActiveTaskRef, CurrentTask};
use crate::plan::{Plan, TaskStatus};

/// Find the single active task.
///
/// Only the first `In Progress` epic is entered, and within it only the first
/// `In Progress` milestone. The first task under that milestone whose status
/// is `Ready` or `In Progress` wins. Later eligible epics, milestones or tasks
/// are never considered.
pub fn current_task(plan: &Plan) -> CurrentTask {
    let Some(epic) = plan
        .epics
        .iter()
        .find(|epic| epic.status == TaskStatus::InProgress)
    else {
        return CurrentTask::NoneFound;
    };
    let Some(milestone) = epic
        .milestones
        .iter()
        .find(|milestone| milestone.status == TaskStatus::InProgress)
    else {
        return CurrentTask::NoneFound;
    };

    milestone
        .features
        .iter()
        .flat_map(|feature| &feature.tasks)
        .find(|task| task.status.is_open())
        .map(|task| {
            CurrentTask::Active(ActiveTaskRef {
                epic_id: epic.id.clone(),
                milestone_id: milestone.id.clone(),
                task: task.clone(),
            })
        })
        .unwrap_or(CurrentTask::NoneFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{Milestone, Task};
    use crate::test_support::{epic, feature, milestone, plan, task};

    /// A milestone holding one feature with one task.
    fn single(milestone_id: &str, status: &str, feature_id: &str, only: Task) -> Milestone {
        milestone(milestone_id, status, vec![feature(feature_id, vec![only])])
    }

    #[test]
    fn no_in_progress_epic_yields_sentinel() {
        let plan = plan(vec![
            epic(
                "E1",
                "Ready",
                vec![single("M1", "In Progress", "F1", task("T1", "Ready", "a"))],
            ),
            epic("E2", "Completed", Vec::new()),
        ]);
        assert_eq!(current_task(&plan), CurrentTask::NoneFound);
    }

    #[test]
    fn returns_ready_task_under_active_chain() {
        let plan = plan(vec![epic(
            "E1",
            "In Progress",
            vec![milestone(
                "M1",
                "In Progress",
                vec![feature("F1", vec![task("T1", "Ready", "Implement X")])],
            )],
        )]);

        let found = current_task(&plan);
        let active = found.active().expect("active task");
        assert_eq!(active.epic_id, "E1");
        assert_eq!(active.milestone_id, "M1");
        assert_eq!(active.task.id, "T1");
    }

    #[test]
    fn only_first_in_progress_epic_is_entered() {
        // E1 is the first In Progress epic but has nothing open; E2 is never searched.
        let plan = plan(vec![
            epic(
                "E1",
                "In Progress",
                vec![single("M1", "In Progress", "F1", task("T1", "Completed", "done"))],
            ),
            epic(
                "E2",
                "In Progress",
                vec![single("M2", "In Progress", "F2", task("T2", "Ready", "next"))],
            ),
        ]);
        assert_eq!(current_task(&plan), CurrentTask::NoneFound);
    }

    #[test]
    fn only_first_in_progress_milestone_is_entered() {
        let plan = plan(vec![epic(
            "E1",
            "In Progress",
            vec![
                single("M0", "Completed", "F0", task("T0", "Ready", "stale")),
                milestone("M1", "In Progress", Vec::new()),
                single("M2", "In Progress", "F2", task("T2", "Ready", "later")),
            ],
        )]);
        assert_eq!(current_task(&plan), CurrentTask::NoneFound);
    }

    #[test]
    fn scans_features_in_order_and_skips_closed_tasks() {
        let plan = plan(vec![epic(
            "E1",
            "In Progress",
            vec![milestone(
                "M1",
                "In Progress",
                vec![
                    feature("F1", vec![task("T1", "Completed", "a"), task("T2", "Blocked", "b")]),
                    feature("F2", vec![task("T3", "In Progress", "c"), task("T4", "Ready", "d")]),
                ],
            )],
        )]);
        assert_eq!(current_task(&plan).task_id(), Some("T3"));
    }

    #[test]
    fn repeated_queries_are_identical() {
        let plan = plan(vec![epic(
            "E1",
            "In Progress",
            vec![single("M1", "In Progress", "F1", task("T1", "Ready", "a"))],
        )]);
        assert_eq!(current_task(&plan), current_task(&plan));
    }
}
