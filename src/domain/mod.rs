//! Domain models for bits
//!
//! Contains the task model, the dependency graph and the lifecycle rules,
//! without any I/O concerns. Persistence is reached through
//! [`TaskRepository`].

mod error;
mod graph;
mod id;
mod lifecycle;
mod task;

pub use error::TaskError;
pub use graph::{DependencyGraph, TreeNode};
pub use id::{IdError, TaskId};
pub use lifecycle::{
    DependencyChange, DependencyRemoval, RemainingWork, TaskLifecycle, TaskRepository,
};
pub use task::{sort_canonical, Priority, StatusFilter, Task, TaskFrontmatter, TaskStatus};
