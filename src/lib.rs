//! bits - A minimal, file-based task tracker for agent workflows
//!
//! Tasks are markdown files with YAML frontmatter, stored per project outside
//! the repository. Dependencies between tasks decide what is ready to work on,
//! at most one task is active at a time, and an optional session record lets
//! an agent hook keep a session working until every task is closed.

pub mod cli;
pub mod domain;
pub mod session;
pub mod storage;

pub use domain::{DependencyGraph, Priority, Task, TaskError, TaskId, TaskLifecycle, TaskStatus};
