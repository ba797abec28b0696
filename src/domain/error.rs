//! Errors raised by graph queries and lifecycle transitions
//!
//! Every variant except [`TaskError::Storage`] is an expected precondition
//! failure the caller can correct; none of them are retried internally.

use thiserror::Error;

use super::id::TaskId;
use super::task::TaskStatus;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Task not found: {id}")]
    TaskNotFound { id: TaskId },

    #[error("Task {id} has status '{current}', expected '{expected}'")]
    InvalidStatus {
        id: TaskId,
        current: TaskStatus,
        expected: TaskStatus,
    },

    #[error("Task {id} ({title}) is already active; release or close it first")]
    ActiveTaskExists { id: TaskId, title: String },

    #[error("Task {id} is blocked by: {}", join_ids(.blocked_by))]
    Blocked { id: TaskId, blocked_by: Vec<TaskId> },

    #[error("Adding dependency {from} -> {to} would create a cycle")]
    CycleDetected { from: TaskId, to: TaskId },

    #[error("Close reason is required")]
    MissingReason,

    #[error("Invalid priority: {value} (valid: critical, high, medium, low)")]
    InvalidPriority { value: String },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl TaskError {
    /// Stable machine-readable code for the error kind
    pub fn code(&self) -> &'static str {
        match self {
            Self::TaskNotFound { .. } => "task_not_found",
            Self::InvalidStatus { .. } => "invalid_status",
            Self::ActiveTaskExists { .. } => "active_task_exists",
            Self::Blocked { .. } => "blocked",
            Self::CycleDetected { .. } => "cycle_detected",
            Self::MissingReason => "missing_reason",
            Self::InvalidPriority { .. } => "invalid_priority",
            Self::Storage(_) => "storage_error",
        }
    }

    pub(crate) fn not_found(id: &TaskId) -> Self {
        Self::TaskNotFound { id: id.clone() }
    }
}

fn join_ids(ids: &[TaskId]) -> String {
    ids.iter()
        .map(TaskId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
