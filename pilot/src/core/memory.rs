//! Append-only conversation memory for one control-loop session.

use serde::Serialize;

use crate::core::action::Action;

/// Who produced a memory record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The model, issuing an action.
    Assistant,
    /// A tool result.
    Tool,
    /// A reply from the human operator.
    User,
    /// Runtime notices such as rejected model output.
    System,
}

/// Payload of a memory record: either an action or an observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryEntry {
    Action(Action),
    Observation(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryRecord {
    pub role: Role,
    #[serde(flatten)]
    pub entry: MemoryEntry,
}

impl MemoryRecord {
    pub fn action(&self) -> Option<&Action> {
        match &self.entry {
            MemoryEntry::Action(action) => Some(action),
            MemoryEntry::Observation(_) => None,
        }
    }

    pub fn observation(&self) -> Option<&str> {
        match &self.entry {
            MemoryEntry::Observation(text) => Some(text),
            MemoryEntry::Action(_) => None,
        }
    }
}

/// Ordered, append-only turn log.
#[derive(Debug, Clone, Default)]
pub struct ConversationMemory {
    records: Vec<MemoryRecord>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_action(&mut self, action: Action) {
        self.records.push(MemoryRecord {
            role: Role::Assistant,
            entry: MemoryEntry::Action(action),
        });
    }

    pub fn push_observation(&mut self, role: Role, text: impl Into<String>) {
        self.records.push(MemoryRecord {
            role,
            entry: MemoryEntry::Observation(text.into()),
        });
    }

    pub fn records(&self) -> &[MemoryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn records_serialize_with_role_and_payload_key() {
        let mut memory = ConversationMemory::new();
        memory.push_action(Action::AskUser {
            question: "Which license?".to_string(),
        });
        memory.push_observation(Role::User, "MIT");

        let value = serde_json::to_value(memory.records()).expect("serialize");
        assert_eq!(
            value,
            json!([
                {
                    "role": "assistant",
                    "action": {"action": "ask_user", "question": "Which license?"}
                },
                {"role": "user", "observation": "MIT"}
            ])
        );
    }
}
