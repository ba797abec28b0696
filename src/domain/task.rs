//! Task domain model
//!
//! Tasks are the units of work tracked by bits. Each one moves through
//! `open -> active -> closed` (with `active -> open` on release) and may
//! depend on other tasks that must close before it can start.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use super::error::TaskError;
use super::id::TaskId;

/// Status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Open,
    Active,
    Closed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Open => "open",
            TaskStatus::Active => "active",
            TaskStatus::Closed => "closed",
        }
    }

    /// Returns true once the task can no longer block anything
    pub fn is_closed(&self) -> bool {
        matches!(self, TaskStatus::Closed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority of a task, `Critical` being the most urgent
///
/// Values read back from disk that are not one of the four known levels are
/// kept verbatim as `Other` and sort after every known level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum Priority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
    Other(String),
}

impl Priority {
    /// Sort rank, lower is more urgent
    pub fn rank(&self) -> u8 {
        match self {
            Priority::Critical => 0,
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
            Priority::Other(_) => 4,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
            Priority::Other(s) => s,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strict parse used when a priority is supplied by a caller
impl FromStr for Priority {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Priority::from(s.trim().to_string()) {
            Priority::Other(value) => Err(TaskError::InvalidPriority { value }),
            known => Ok(known),
        }
    }
}

impl From<String> for Priority {
    fn from(value: String) -> Self {
        match value.as_str() {
            "critical" => Priority::Critical,
            "high" => Priority::High,
            "medium" => Priority::Medium,
            "low" => Priority::Low,
            _ => Priority::Other(value),
        }
    }
}

impl From<Priority> for String {
    fn from(priority: Priority) -> Self {
        priority.as_str().to_string()
    }
}

/// A tracked unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: TaskId,

    /// Human-readable title
    pub title: String,

    /// Optional free-text body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Current status
    pub status: TaskStatus,

    /// Urgency
    pub priority: Priority,

    /// When the task was created
    pub created_at: DateTime<Utc>,

    /// When the task was closed (set only while closed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,

    /// Why the task was closed (set only while closed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_reason: Option<String>,

    /// Tasks that must be closed before this one can start
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<TaskId>,
}

impl Task {
    /// Creates a new open task
    pub fn new(id: TaskId, title: impl Into<String>, priority: Priority) -> Self {
        Self {
            id,
            title: title.into(),
            description: None,
            status: TaskStatus::Open,
            priority,
            created_at: Utc::now(),
            closed_at: None,
            close_reason: None,
            depends_on: Vec::new(),
        }
    }

    /// Sets the description, treating blank text as no description
    pub fn set_description(&mut self, description: impl Into<String>) {
        let description = description.into();
        let trimmed = description.trim();
        self.description = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
    }

    /// Transitions to active
    pub fn activate(&mut self) {
        self.status = TaskStatus::Active;
    }

    /// Transitions back to open
    pub fn reopen(&mut self) {
        self.status = TaskStatus::Open;
    }

    /// Transitions to closed, stamping the close time and reason together
    pub fn close(&mut self, reason: impl Into<String>) {
        self.status = TaskStatus::Closed;
        self.closed_at = Some(Utc::now());
        self.close_reason = Some(reason.into());
    }

    /// Appends a dependency; returns false if it was already present
    pub fn add_dependency(&mut self, dep: TaskId) -> bool {
        if self.depends_on.contains(&dep) {
            return false;
        }
        self.depends_on.push(dep);
        true
    }

    /// Removes a dependency; returns false if it was not present
    pub fn remove_dependency(&mut self, dep: &TaskId) -> bool {
        let len_before = self.depends_on.len();
        self.depends_on.retain(|d| d != dep);
        self.depends_on.len() != len_before
    }

    /// Canonical ordering: priority rank, then creation time, then ID
    ///
    /// The ID tie-break keeps the order total when two tasks share a
    /// priority and timestamp.
    pub fn canonical_cmp(&self, other: &Task) -> Ordering {
        self.priority
            .rank()
            .cmp(&other.priority.rank())
            .then_with(|| self.created_at.cmp(&other.created_at))
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Sorts tasks in canonical order
pub fn sort_canonical<T: std::borrow::Borrow<Task>>(tasks: &mut [T]) {
    tasks.sort_by(|a, b| a.borrow().canonical_cmp(b.borrow()));
}

/// Selects which statuses a listing includes; an empty filter matches everything
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusFilter {
    pub open: bool,
    pub active: bool,
    pub closed: bool,
}

impl StatusFilter {
    pub fn matches(&self, status: TaskStatus) -> bool {
        if !self.open && !self.active && !self.closed {
            return true;
        }
        match status {
            TaskStatus::Open => self.open,
            TaskStatus::Active => self.active,
            TaskStatus::Closed => self.closed,
        }
    }
}

/// YAML frontmatter stored at the top of each task file
///
/// The description lives in the markdown body, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFrontmatter {
    pub id: TaskId,
    pub title: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<TaskId>,
}

impl From<&Task> for TaskFrontmatter {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            title: task.title.clone(),
            status: task.status,
            priority: task.priority.clone(),
            created_at: task.created_at,
            closed_at: task.closed_at,
            close_reason: task.close_reason.clone(),
            depends_on: task.depends_on.clone(),
        }
    }
}

impl TaskFrontmatter {
    /// Converts to a Task with the given markdown body as description
    pub fn into_task(self, body: &str) -> Task {
        let body = body.trim();
        Task {
            id: self.id,
            title: self.title,
            description: (!body.is_empty()).then(|| body.to_string()),
            status: self.status,
            priority: self.priority,
            created_at: self.created_at,
            closed_at: self.closed_at,
            close_reason: self.close_reason,
            depends_on: self.depends_on,
        }
    }
}
