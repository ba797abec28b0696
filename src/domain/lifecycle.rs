//! Task lifecycle
//!
//! Every transition loads a fresh snapshot from the repository, checks its
//! preconditions against that snapshot and persists the single task it
//! changed. The "at most one active task" rule is enforced by scanning the
//! snapshot on claim; nothing records the active task separately.

use std::collections::HashSet;

use chrono::Utc;

use super::error::TaskError;
use super::graph::DependencyGraph;
use super::id::TaskId;
use super::task::{sort_canonical, StatusFilter, Task, TaskStatus};

/// Persistence seam for tasks
///
/// The file-backed store is the only production implementation; tests use an
/// in-memory one.
pub trait TaskRepository {
    /// Returns every task in the store
    fn list_all(&self) -> Result<Vec<Task>, TaskError>;

    /// Returns every ID already taken in the store, including entries that
    /// `list_all` cannot read back as tasks
    fn ids(&self) -> Result<Vec<TaskId>, TaskError>;

    /// Loads a task, failing with `TaskNotFound` if absent
    fn load(&self, id: &TaskId) -> Result<Task, TaskError>;

    /// Persists the full state of a task, replacing any previous version
    fn save(&self, task: &Task) -> Result<(), TaskError>;

    /// Deletes a task, failing with `TaskNotFound` if absent
    fn delete(&self, id: &TaskId) -> Result<(), TaskError>;
}

/// Outcome of adding a dependency
#[derive(Debug, Clone, PartialEq)]
pub enum DependencyChange {
    /// The edge was added; holds the updated task
    Added(Task),
    /// The edge already existed; nothing was written
    AlreadyExists,
}

/// Outcome of removing a dependency
#[derive(Debug, Clone, PartialEq)]
pub enum DependencyRemoval {
    /// The edge was removed; holds the updated task
    Removed(Task),
    /// The edge was not present; nothing was written
    NotFound,
}

/// Store-wide view of unfinished work
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemainingWork {
    pub active: Option<Task>,
    pub open: usize,
}

impl RemainingWork {
    pub fn is_empty(&self) -> bool {
        self.active.is_none() && self.open == 0
    }
}

/// Applies status transitions and dependency edits to a repository
pub struct TaskLifecycle<R> {
    repo: R,
}

impl<R: TaskRepository> TaskLifecycle<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Builds a dependency graph from the current store contents
    pub fn graph(&self) -> Result<DependencyGraph, TaskError> {
        Ok(DependencyGraph::from_tasks(self.repo.list_all()?))
    }

    /// Loads a single task
    pub fn get(&self, id: &TaskId) -> Result<Task, TaskError> {
        self.repo.load(id)
    }

    /// Lists tasks matching the filter in canonical order
    pub fn list(&self, filter: StatusFilter) -> Result<Vec<Task>, TaskError> {
        let mut tasks: Vec<Task> = self
            .repo
            .list_all()?
            .into_iter()
            .filter(|t| filter.matches(t.status))
            .collect();
        sort_canonical(&mut tasks);
        Ok(tasks)
    }

    /// Creates a new open task
    ///
    /// `priority` must be one of the four known levels.
    pub fn create(
        &self,
        title: &str,
        description: Option<&str>,
        priority: &str,
    ) -> Result<Task, TaskError> {
        let priority = priority.parse()?;
        let taken: HashSet<String> = self.repo.ids()?.into_iter().map(String::from).collect();

        let now = Utc::now();
        let id = TaskId::generate(title, now, |candidate| taken.contains(candidate));

        let mut task = Task::new(id, title.trim(), priority);
        task.created_at = now;
        if let Some(description) = description {
            task.set_description(description);
        }

        self.repo.save(&task)?;
        Ok(task)
    }

    /// Moves an open, unblocked task to active
    ///
    /// Fails if the task is not open, if an existing dependency is still
    /// unclosed, or if any task in the store is already active (checked in
    /// that order). A task blocked by the active task reports the blocker.
    pub fn claim(&self, id: &TaskId) -> Result<Task, TaskError> {
        let graph = self.graph()?;
        let task = graph.get(id).ok_or_else(|| TaskError::not_found(id))?;

        if task.status != TaskStatus::Open {
            return Err(TaskError::InvalidStatus {
                id: id.clone(),
                current: task.status,
                expected: TaskStatus::Open,
            });
        }

        let blocked_by = graph.blocked_by(id);
        if !blocked_by.is_empty() {
            return Err(TaskError::Blocked {
                id: id.clone(),
                blocked_by,
            });
        }

        if let Some(active) = graph.active() {
            return Err(TaskError::ActiveTaskExists {
                id: active.id.clone(),
                title: active.title.clone(),
            });
        }

        let mut task = task.clone();
        task.activate();
        self.repo.save(&task)?;
        Ok(task)
    }

    /// Moves an active task back to open
    pub fn release(&self, id: &TaskId) -> Result<Task, TaskError> {
        let mut task = self.repo.load(id)?;
        expect_status(&task, TaskStatus::Active)?;

        task.reopen();
        self.repo.save(&task)?;
        Ok(task)
    }

    /// Closes an active task with a non-empty reason
    pub fn close(&self, id: &TaskId, reason: &str) -> Result<Task, TaskError> {
        let mut task = self.repo.load(id)?;
        expect_status(&task, TaskStatus::Active)?;

        let reason = reason.trim();
        if reason.is_empty() {
            return Err(TaskError::MissingReason);
        }

        task.close(reason);
        self.repo.save(&task)?;
        Ok(task)
    }

    /// Makes `id` depend on `dep`
    ///
    /// Both tasks must exist and the edge must not close a cycle. Adding an
    /// edge that is already present succeeds without writing.
    pub fn add_dependency(&self, id: &TaskId, dep: &TaskId) -> Result<DependencyChange, TaskError> {
        let graph = self.graph()?;
        graph.validate_add_dependency(id, dep)?;

        let mut task = graph.get(id).cloned().ok_or_else(|| TaskError::not_found(id))?;
        if !task.add_dependency(dep.clone()) {
            return Ok(DependencyChange::AlreadyExists);
        }

        self.repo.save(&task)?;
        Ok(DependencyChange::Added(task))
    }

    /// Removes `dep` from the dependencies of `id`
    ///
    /// `dep` does not need to exist as a task, so dangling edges can be
    /// cleaned up.
    pub fn remove_dependency(
        &self,
        id: &TaskId,
        dep: &TaskId,
    ) -> Result<DependencyRemoval, TaskError> {
        let mut task = self.repo.load(id)?;
        if !task.remove_dependency(dep) {
            return Ok(DependencyRemoval::NotFound);
        }

        self.repo.save(&task)?;
        Ok(DependencyRemoval::Removed(task))
    }

    /// Deletes a task after stripping it from every other task's dependencies
    pub fn remove(&self, id: &TaskId) -> Result<Task, TaskError> {
        let task = self.repo.load(id)?;
        let others = self.repo.list_all()?;
        self.strip_references(others, |dep| dep == id)?;

        self.repo.delete(id)?;
        Ok(task)
    }

    /// Deletes every closed task, cleaning up references to them
    ///
    /// Returns the removed IDs in store order.
    pub fn prune_closed(&self) -> Result<Vec<TaskId>, TaskError> {
        let (closed, remaining): (Vec<Task>, Vec<Task>) = self
            .repo
            .list_all()?
            .into_iter()
            .partition(|t| t.status.is_closed());

        let closed_ids: Vec<TaskId> = closed.into_iter().map(|t| t.id).collect();
        if closed_ids.is_empty() {
            return Ok(closed_ids);
        }

        self.strip_references(remaining, |dep| closed_ids.contains(dep))?;
        for id in &closed_ids {
            self.repo.delete(id)?;
        }
        Ok(closed_ids)
    }

    /// Returns the active task and the number of open tasks
    pub fn remaining_work(&self) -> Result<RemainingWork, TaskError> {
        let mut work = RemainingWork::default();
        for task in self.repo.list_all()? {
            match task.status {
                TaskStatus::Active => work.active = Some(task),
                TaskStatus::Open => work.open += 1,
                TaskStatus::Closed => {}
            }
        }
        Ok(work)
    }

    /// Removes matching dependency IDs, saving only tasks that changed
    fn strip_references(
        &self,
        tasks: Vec<Task>,
        is_target: impl Fn(&TaskId) -> bool,
    ) -> Result<(), TaskError> {
        for mut task in tasks {
            let before = task.depends_on.len();
            task.depends_on.retain(|dep| !is_target(dep));
            if task.depends_on.len() != before {
                self.repo.save(&task)?;
            }
        }
        Ok(())
    }
}

fn expect_status(task: &Task, expected: TaskStatus) -> Result<(), TaskError> {
    if task.status != expected {
        return Err(TaskError::InvalidStatus {
            id: task.id.clone(),
            current: task.status,
            expected,
        });
    }
    Ok(())
}
