//! Semantic plan invariants not expressible via JSON Schema.

use std::collections::HashSet;

use crate::plan::Plan;

/// Check plan invariants:
/// - No duplicate ids across epics, milestones, features and tasks
/// - No blank ids
pub fn validate_invariants(plan: &Plan) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for epic in &plan.epics {
        check_id(&epic.id, &epic.id, &mut seen, &mut errors);
        for milestone in &epic.milestones {
            let milestone_path = format!("{}/{}", epic.id, milestone.id);
            check_id(&milestone.id, &milestone_path, &mut seen, &mut errors);
            for feature in &milestone.features {
                let feature_path = format!("{}/{}", milestone_path, feature.id);
                check_id(&feature.id, &feature_path, &mut seen, &mut errors);
                for task in &feature.tasks {
                    let task_path = format!("{}/{}", feature_path, task.id);
                    check_id(&task.id, &task_path, &mut seen, &mut errors);
                }
            }
        }
    }

    errors
}

fn check_id(id: &str, path: &str, seen: &mut HashSet<String>, errors: &mut Vec<String>) {
    if id.trim().is_empty() {
        errors.push(format!("{}: id must not be blank", path));
        return;
    }
    if !seen.insert(id.to_string()) {
        errors.push(format!("duplicate id '{}' at {}", id, path));
    }
}
