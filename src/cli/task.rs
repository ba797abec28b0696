//! Task CLI commands

use anyhow::Result;

use super::output::Output;
use crate::domain::{
    DependencyChange, DependencyGraph, DependencyRemoval, Priority, StatusFilter, Task, TaskId,
    TaskStatus,
};
use crate::storage::Project;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Checkbox-style marker for a status
pub(crate) fn status_icon(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Open => "[ ]",
        TaskStatus::Active => "[*]",
        TaskStatus::Closed => "[X]",
    }
}

/// Short priority label, `P0` being the most urgent
pub(crate) fn priority_mark(priority: &Priority) -> &'static str {
    match priority {
        Priority::Critical => "P0",
        Priority::High => "P1",
        Priority::Medium => "P2",
        Priority::Low => "P3",
        Priority::Other(_) => "P?",
    }
}

/// One-line summary, with the tasks currently blocking it if any
pub(crate) fn task_line(task: &Task, blockers: &[TaskId]) -> String {
    let mut line = format!(
        "{} {} [{}] {}",
        status_icon(task.status),
        priority_mark(&task.priority),
        task.id,
        task.title
    );
    if !blockers.is_empty() {
        let ids: Vec<&str> = blockers.iter().map(TaskId::as_str).collect();
        line.push_str(&format!(" [blocked by: {}]", ids.join(", ")));
    }
    line
}

/// Prints a list of tasks in the current format
pub(crate) fn print_tasks(output: &Output, tasks: &[&Task], graph: &DependencyGraph) {
    if output.is_json() {
        output.data(&tasks);
    } else if tasks.is_empty() {
        println!("No tasks found.");
    } else {
        for task in tasks {
            println!("{}", task_line(task, &graph.blocked_by(&task.id)));
        }
    }
}

/// Prints a single task in the current format
fn print_task(output: &Output, task: &Task) {
    if output.is_json() {
        output.data(task);
        return;
    }

    println!("[{}] {}", task.id, task.title);
    println!("  Status:   {}", task.status);
    println!("  Priority: {}", task.priority);
    println!("  Created:  {}", task.created_at.format(TIME_FORMAT));
    if let Some(closed_at) = task.closed_at {
        println!("  Closed:   {}", closed_at.format(TIME_FORMAT));
    }
    if let Some(reason) = &task.close_reason {
        println!("  Reason:   {}", reason);
    }
    if !task.depends_on.is_empty() {
        let ids: Vec<&str> = task.depends_on.iter().map(TaskId::as_str).collect();
        println!("  Depends:  {}", ids.join(", "));
    }
    if let Some(description) = &task.description {
        println!();
        println!("{}", description);
    }
}

pub fn add(
    project: &Project,
    output: &Output,
    title: &str,
    description: Option<&str>,
    priority: Option<&str>,
) -> Result<()> {
    if title.trim().is_empty() {
        anyhow::bail!("Task title must not be empty");
    }

    let priority = priority.unwrap_or_else(|| project.config().default_priority());
    output.verbose_ctx(
        "add",
        &format!(
            "Creating task in {} with priority {}",
            project.store_dir().display(),
            priority
        ),
    );

    let task = project.lifecycle().create(title, description, priority)?;
    output.verbose_ctx("add", &format!("Assigned id {}", task.id));

    print_task(output, &task);
    Ok(())
}

pub fn list(
    project: &Project,
    output: &Output,
    open: bool,
    active: bool,
    closed: bool,
) -> Result<()> {
    let filter = StatusFilter {
        open,
        active,
        closed,
    };

    let lifecycle = project.lifecycle();
    let tasks = lifecycle.list(filter)?;
    // Blockers are resolved against every task, not just the listed ones
    let graph = lifecycle.graph()?;
    output.verbose_ctx(
        "list",
        &format!(
            "{} of {} tasks in {} match {:?}",
            tasks.len(),
            graph.len(),
            project.store_dir().display(),
            filter
        ),
    );

    let tasks: Vec<&Task> = tasks.iter().collect();
    print_tasks(output, &tasks, &graph);
    Ok(())
}

pub fn show(project: &Project, output: &Output, id: &TaskId) -> Result<()> {
    output.verbose_ctx("show", &format!("Loading {}", id));
    let task = project.lifecycle().get(id)?;
    print_task(output, &task);
    Ok(())
}

pub fn claim(project: &Project, output: &Output, id: &TaskId) -> Result<()> {
    output.verbose_ctx("claim", &format!("Claiming {}", id));
    let task = project.lifecycle().claim(id)?;
    print_task(output, &task);
    Ok(())
}

pub fn release(project: &Project, output: &Output, id: &TaskId) -> Result<()> {
    output.verbose_ctx("release", &format!("Releasing {}", id));
    let task = project.lifecycle().release(id)?;
    print_task(output, &task);
    Ok(())
}

pub fn close(project: &Project, output: &Output, id: &TaskId, reason: &str) -> Result<()> {
    output.verbose_ctx("close", &format!("Closing {}", id));
    let task = project.lifecycle().close(id, reason)?;
    print_task(output, &task);
    Ok(())
}

pub fn add_dependency(
    project: &Project,
    output: &Output,
    id: &TaskId,
    depends_on: &TaskId,
) -> Result<()> {
    output.verbose_ctx("dep", &format!("{} depends on {}", id, depends_on));

    match project.lifecycle().add_dependency(id, depends_on)? {
        DependencyChange::Added(task) => print_task(output, &task),
        DependencyChange::AlreadyExists => output.success("Dependency already exists"),
    }
    Ok(())
}

pub fn remove_dependency(
    project: &Project,
    output: &Output,
    id: &TaskId,
    depends_on: &TaskId,
) -> Result<()> {
    output.verbose_ctx("undep", &format!("{} no longer depends on {}", id, depends_on));

    match project.lifecycle().remove_dependency(id, depends_on)? {
        DependencyRemoval::Removed(task) => print_task(output, &task),
        DependencyRemoval::NotFound => output.success("Dependency not found"),
    }
    Ok(())
}

pub fn remove(project: &Project, output: &Output, id: &TaskId) -> Result<()> {
    let task = project.lifecycle().remove(id)?;
    output.verbose_ctx("rm", &format!("Deleted {} ({})", task.id, task.title));

    output.success(&format!("Removed task {}", task.id));
    Ok(())
}

pub fn prune(project: &Project, output: &Output) -> Result<()> {
    let pruned = project.lifecycle().prune_closed()?;
    output.verbose_ctx("prune", &format!("Deleted {:?}", pruned));

    if pruned.is_empty() {
        output.success("No closed tasks to prune");
    } else {
        output.success(&format!("Pruned {} closed task(s)", pruned.len()));
    }
    Ok(())
}
