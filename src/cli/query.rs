//! Query commands (ready, blocked, graph)
//!
//! Read-only views computed from a fresh dependency graph on every call.

use anyhow::Result;
use serde::Serialize;

use super::output::Output;
use super::task::{print_tasks, status_icon, task_line};
use crate::domain::{Task, TaskId, TreeNode};
use crate::storage::Project;

/// Show tasks ready to work on
pub fn ready(project: &Project, output: &Output) -> Result<()> {
    let graph = project.lifecycle().graph()?;
    let ready = graph.ready();
    output.verbose_ctx(
        "ready",
        &format!("{} of {} tasks are ready", ready.len(), graph.len()),
    );

    print_tasks(output, &ready, &graph);
    Ok(())
}

#[derive(Serialize)]
struct BlockedTask<'a> {
    #[serde(flatten)]
    task: &'a Task,
    blocked_by: Vec<TaskId>,
}

/// Show open tasks waiting on dependencies
pub fn blocked(project: &Project, output: &Output) -> Result<()> {
    let graph = project.lifecycle().graph()?;
    let blocked = graph.blocked();
    output.verbose_ctx(
        "blocked",
        &format!("{} of {} tasks are blocked", blocked.len(), graph.len()),
    );

    if output.is_json() {
        let items: Vec<BlockedTask> = blocked
            .into_iter()
            .map(|(task, blocked_by)| BlockedTask { task, blocked_by })
            .collect();
        output.data(&items);
    } else if blocked.is_empty() {
        println!("No tasks found.");
    } else {
        for (task, blockers) in &blocked {
            println!("{}", task_line(task, blockers));
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct GraphNode<'a> {
    #[serde(flatten)]
    task: &'a Task,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<GraphNode<'a>>,
}

impl<'a> From<&TreeNode<'a>> for GraphNode<'a> {
    fn from(node: &TreeNode<'a>) -> Self {
        Self {
            task: node.task,
            children: node.children.iter().map(GraphNode::from).collect(),
        }
    }
}

/// Renders a display forest as an ASCII tree
///
/// Roots sit at the left margin; each child is drawn under the task that
/// blocks it.
pub(crate) fn render_tree(forest: &[TreeNode<'_>]) -> String {
    let mut out = String::new();
    for root in forest {
        out.push_str(&node_label(root.task));
        out.push('\n');
        render_children(&mut out, &root.children, "");
    }
    out
}

fn render_children(out: &mut String, children: &[TreeNode<'_>], prefix: &str) {
    for (i, child) in children.iter().enumerate() {
        let last = i + 1 == children.len();
        let (connector, extension) = if last {
            ("└── ", "    ")
        } else {
            ("├── ", "│   ")
        };

        out.push_str(prefix);
        out.push_str(connector);
        out.push_str(&node_label(child.task));
        out.push('\n');

        render_children(out, &child.children, &format!("{}{}", prefix, extension));
    }
}

fn node_label(task: &Task) -> String {
    format!("{} [{}] {}", status_icon(task.status), task.id, task.title)
}

/// Show the dependency tree
pub fn graph(project: &Project, output: &Output) -> Result<()> {
    let graph = project.lifecycle().graph()?;
    if graph.has_cycle() {
        output.verbose_ctx("graph", "Stored dependencies contain a cycle");
    }

    let forest = graph.display_tree();
    output.verbose_ctx("graph", &format!("{} root(s)", forest.len()));

    if output.is_json() {
        let nodes: Vec<GraphNode> = forest.iter().map(GraphNode::from).collect();
        output.data(&nodes);
    } else if forest.is_empty() {
        println!("No tasks found.");
    } else {
        print!("{}", render_tree(&forest));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DependencyGraph, Priority};

    fn task(id: &str, deps: &[&str]) -> Task {
        let mut task = Task::new(id.parse().unwrap(), format!("Task {}", id), Priority::Medium);
        for dep in deps {
            task.add_dependency(dep.parse().unwrap());
        }
        task
    }

    #[test]
    fn renders_nested_tree() {
        let graph = DependencyGraph::from_tasks(vec![
            task("a", &[]),
            task("b", &["a"]),
            task("c", &["a"]),
            task("d", &["b"]),
        ]);

        let rendered = render_tree(&graph.display_tree());
        assert_eq!(
            rendered,
            "[ ] [a] Task a\n\
             ├── [ ] [b] Task b\n\
             │   └── [ ] [d] Task d\n\
             └── [ ] [c] Task c\n"
        );
    }

    #[test]
    fn renders_independent_roots() {
        let graph = DependencyGraph::from_tasks(vec![task("a", &[]), task("b", &[])]);
        assert_eq!(
            render_tree(&graph.display_tree()),
            "[ ] [a] Task a\n[ ] [b] Task b\n"
        );
    }

    #[test]
    fn graph_json_nests_children() {
        let graph = DependencyGraph::from_tasks(vec![task("a", &[]), task("b", &["a"])]);
        let forest = graph.display_tree();
        let nodes: Vec<GraphNode> = forest.iter().map(GraphNode::from).collect();

        let json = serde_json::to_value(&nodes).unwrap();
        assert_eq!(json[0]["id"], "a");
        assert_eq!(json[0]["children"][0]["id"], "b");
        assert!(json[0]["children"][0].get("children").is_none());
    }
}
