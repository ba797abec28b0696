//! Agent hook protocol
//!
//! Hooks send a small JSON object on stdin. The stop hook answers with a
//! block response on stdout when the session must keep working, and with
//! nothing at all when it may stop.

use std::io::Read;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::drain::StopDecision;

#[derive(Debug, Error)]
pub enum HookInputError {
    #[error("No input from stdin")]
    Empty,

    #[error("session_id is required")]
    MissingSessionId,

    #[error("Invalid hook input: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to read hook input: {0}")]
    Io(#[from] std::io::Error),
}

/// Payload a hook receives on stdin
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HookInput {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub source: String,
}

impl HookInput {
    /// Reads and validates a payload from a reader (normally stdin)
    pub fn from_reader(mut reader: impl Read) -> Result<Self, HookInputError> {
        let mut data = String::new();
        reader.read_to_string(&mut data)?;
        Self::parse(&data)
    }

    pub fn parse(data: &str) -> Result<Self, HookInputError> {
        if data.trim().is_empty() {
            return Err(HookInputError::Empty);
        }

        let input: HookInput = serde_json::from_str(data)?;
        if input.session_id.is_empty() {
            return Err(HookInputError::MissingSessionId);
        }
        Ok(input)
    }
}

/// Response printed by the stop hook to keep the session working
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookResponse {
    pub decision: &'static str,
    pub reason: String,
    #[serde(rename = "systemMessage")]
    pub system_message: String,
}

impl HookResponse {
    /// Builds the block response for a decision; `None` means the stop is allowed
    pub fn for_decision(decision: &StopDecision) -> Option<Self> {
        match decision {
            StopDecision::Allow => None,
            StopDecision::BlockActive(task) => Some(Self {
                decision: "block",
                reason: format!(
                    "Continue working on task {id}. Run 'bits show {id}' for details. When complete: bits close {id} \"reason\".",
                    id = task.id
                ),
                system_message: format!("Task {}: Still active", task.id),
            }),
            StopDecision::BlockOpen(count) => Some(Self {
                decision: "block",
                reason: format!(
                    "There are {} open tasks remaining. Use 'bits ready' to see available work.",
                    count
                ),
                system_message: format!("{} open tasks remaining", count),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Priority, Task};

    #[test]
    fn parse_hook_input() {
        let input =
            HookInput::from_reader(r#"{"session_id": "abc", "source": "startup", "cwd": "/x"}"#.as_bytes())
                .unwrap();
        assert_eq!(input.session_id, "abc");
        assert_eq!(input.source, "startup");

        let input = HookInput::parse(r#"{"session_id": "abc"}"#).unwrap();
        assert_eq!(input.source, "");
    }

    #[test]
    fn reject_bad_hook_input() {
        assert!(matches!(HookInput::parse(""), Err(HookInputError::Empty)));
        assert!(matches!(HookInput::parse("  \n"), Err(HookInputError::Empty)));
        assert!(matches!(
            HookInput::parse(r#"{"source": "startup"}"#),
            Err(HookInputError::MissingSessionId)
        ));
        assert!(matches!(
            HookInput::parse("not json"),
            Err(HookInputError::Parse(_))
        ));
    }

    #[test]
    fn allow_has_no_response() {
        assert!(HookResponse::for_decision(&StopDecision::Allow).is_none());
    }

    #[test]
    fn active_task_response() {
        let task = Task::new("k3f".parse().unwrap(), "Ship it", Priority::High);
        let response = HookResponse::for_decision(&StopDecision::BlockActive(task)).unwrap();

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["decision"], "block");
        assert_eq!(
            json["reason"],
            "Continue working on task k3f. Run 'bits show k3f' for details. When complete: bits close k3f \"reason\"."
        );
        assert_eq!(json["systemMessage"], "Task k3f: Still active");
    }

    #[test]
    fn open_tasks_response() {
        let response = HookResponse::for_decision(&StopDecision::BlockOpen(2)).unwrap();
        assert_eq!(
            response.reason,
            "There are 2 open tasks remaining. Use 'bits ready' to see available work."
        );
        assert_eq!(response.system_message, "2 open tasks remaining");
    }
}
