//! Action contract between the model and the control loop.
//!
//! [`validate`] is the trust boundary: raw model output goes in, a typed
//! [`Action`] comes out. Fields beyond the required ones are ignored.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ValidationFailure;

/// Tool parameters as supplied by the model.
pub type Parameters = Map<String, Value>;

const EXECUTE_TOOL: &str = "execute_tool";
const ASK_USER: &str = "ask_user";
const COMPLETE_TASK: &str = "complete_task";

/// A validated instruction from the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    ExecuteTool {
        tool_name: String,
        parameters: Parameters,
    },
    AskUser {
        question: String,
    },
    CompleteTask {
        final_message: String,
    },
}

impl Action {
    pub fn tag(&self) -> &'static str {
        match self {
            Action::ExecuteTool { .. } => EXECUTE_TOOL,
            Action::AskUser { .. } => ASK_USER,
            Action::CompleteTask { .. } => COMPLETE_TASK,
        }
    }
}

/// Validate raw model output against the action contract.
///
/// Rules, in order: the root is an object; `action` names a known variant;
/// the variant's required fields are present and typed.
pub fn validate(raw: &Value) -> Result<Action, ValidationFailure> {
    let object = raw.as_object().ok_or(ValidationFailure::NotAnObject)?;
    let tag = object.get("action").ok_or(ValidationFailure::MissingAction)?;

    match tag.as_str() {
        Some(EXECUTE_TOOL) => {
            let tool_name = required_str(object, EXECUTE_TOOL, "tool_name")?;
            let parameters = required(object, EXECUTE_TOOL, "parameters")?
                .as_object()
                .cloned()
                .ok_or(ValidationFailure::InvalidField {
                    action: EXECUTE_TOOL,
                    field: "parameters",
                    expected: "an object",
                })?;
            Ok(Action::ExecuteTool {
                tool_name,
                parameters,
            })
        }
        Some(ASK_USER) => Ok(Action::AskUser {
            question: required_str(object, ASK_USER, "question")?,
        }),
        Some(COMPLETE_TASK) => Ok(Action::CompleteTask {
            final_message: required_str(object, COMPLETE_TASK, "final_message")?,
        }),
        Some(other) => Err(ValidationFailure::UnknownAction(other.to_string())),
        None => Err(ValidationFailure::UnknownAction(tag.to_string())),
    }
}

fn required<'a>(
    object: &'a Map<String, Value>,
    action: &'static str,
    field: &'static str,
) -> Result<&'a Value, ValidationFailure> {
    object
        .get(field)
        .ok_or(ValidationFailure::MissingField { action, field })
}

fn required_str(
    object: &Map<String, Value>,
    action: &'static str,
    field: &'static str,
) -> Result<String, ValidationFailure> {
    required(object, action, field)?
        .as_str()
        .map(str::to_string)
        .ok_or(ValidationFailure::InvalidField {
            action,
            field,
            expected: "a string",
        })
}
