//! Dependency graph for tasks
//!
//! Built fresh from a snapshot of every task in the store and never updated
//! incrementally. Edges point from a task to each task it depends on, so a
//! breadth-first walk from a node visits everything it transitively waits on.
//!
//! Dependency IDs that do not resolve to a task in the snapshot become
//! placeholder nodes with no outgoing edges: they never block, and traversal
//! treats them as dead ends.

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;
use petgraph::Direction;
use std::collections::{HashMap, HashSet};

use super::error::TaskError;
use super::id::TaskId;
use super::task::{sort_canonical, Task, TaskStatus};

/// A task together with the tasks that depend on it
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode<'a> {
    pub task: &'a Task,
    pub children: Vec<TreeNode<'a>>,
}

/// A dependency graph over a task snapshot
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Directed graph, edge `a -> b` means "a depends on b"
    graph: DiGraph<TaskId, ()>,

    /// Map from TaskId to node index (includes unresolved dependency IDs)
    node_map: HashMap<TaskId, NodeIndex>,

    /// Tasks in snapshot order
    tasks: Vec<Task>,

    /// Map from TaskId to position in `tasks`
    index: HashMap<TaskId, usize>,
}

fn ensure_node(
    graph: &mut DiGraph<TaskId, ()>,
    node_map: &mut HashMap<TaskId, NodeIndex>,
    id: &TaskId,
) -> NodeIndex {
    if let Some(idx) = node_map.get(id) {
        return *idx;
    }
    let idx = graph.add_node(id.clone());
    node_map.insert(id.clone(), idx);
    idx
}

impl DependencyGraph {
    /// Builds a graph from a snapshot of tasks
    ///
    /// If the snapshot holds the same ID twice, the first occurrence wins.
    pub fn from_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let mut graph = DiGraph::new();
        let mut node_map = HashMap::new();
        let mut snapshot = Vec::new();
        let mut index = HashMap::new();

        // First pass: add all tasks as nodes
        for task in tasks {
            if index.contains_key(&task.id) {
                continue;
            }
            ensure_node(&mut graph, &mut node_map, &task.id);
            index.insert(task.id.clone(), snapshot.len());
            snapshot.push(task);
        }

        // Second pass: add all edges
        for task in &snapshot {
            let from = node_map[&task.id];
            for dep in &task.depends_on {
                let to = ensure_node(&mut graph, &mut node_map, dep);
                graph.update_edge(from, to, ());
            }
        }

        Self {
            graph,
            node_map,
            tasks: snapshot,
            index,
        }
    }

    /// Returns a task by ID
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.index.get(id).map(|&i| &self.tasks[i])
    }

    /// Returns true if the snapshot contains the task
    pub fn contains(&self, id: &TaskId) -> bool {
        self.index.contains_key(id)
    }

    /// Returns all tasks in snapshot order
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Returns the number of tasks in the snapshot
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true if the snapshot is empty
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Returns the active task, if any
    pub fn active(&self) -> Option<&Task> {
        self.tasks.iter().find(|t| t.status == TaskStatus::Active)
    }

    /// Returns true if any existing dependency of the task is not closed
    ///
    /// Unknown task IDs are never blocked.
    pub fn is_blocked(&self, id: &TaskId) -> bool {
        self.get(id)
            .is_some_and(|task| task.depends_on.iter().any(|dep| self.blocks(dep)))
    }

    /// Returns the dependencies currently blocking a task, in `depends_on` order
    pub fn blocked_by(&self, id: &TaskId) -> Vec<TaskId> {
        match self.get(id) {
            Some(task) => task
                .depends_on
                .iter()
                .filter(|dep| self.blocks(dep))
                .cloned()
                .collect(),
            None => vec![],
        }
    }

    /// A dependency blocks when it resolves to a task that is not closed
    fn blocks(&self, dep: &TaskId) -> bool {
        self.get(dep).is_some_and(|t| !t.status.is_closed())
    }

    /// Returns true if adding `from -> to` ("from depends on to") would close a cycle
    ///
    /// Walks breadth-first from `to` along existing dependency edges and
    /// reports a cycle if the walk reaches `from`.
    pub fn would_create_cycle(&self, from: &TaskId, to: &TaskId) -> bool {
        if from == to {
            return true;
        }

        let (Some(&start), Some(&target)) = (self.node_map.get(to), self.node_map.get(from))
        else {
            return false;
        };

        let mut bfs = Bfs::new(&self.graph, start);
        while let Some(node) = bfs.next(&self.graph) {
            if node == target {
                return true;
            }
        }
        false
    }

    /// Checks that `from` may depend on `to` without mutating anything
    ///
    /// Existence of both tasks is checked before the cycle walk.
    pub fn validate_add_dependency(&self, from: &TaskId, to: &TaskId) -> Result<(), TaskError> {
        if !self.contains(from) {
            return Err(TaskError::not_found(from));
        }
        if !self.contains(to) {
            return Err(TaskError::not_found(to));
        }
        if self.would_create_cycle(from, to) {
            return Err(TaskError::CycleDetected {
                from: from.clone(),
                to: to.clone(),
            });
        }
        Ok(())
    }

    /// Returns open, unblocked tasks in canonical order
    pub fn ready(&self) -> Vec<&Task> {
        let mut ready: Vec<&Task> = self
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Open && !self.is_blocked(&t.id))
            .collect();
        sort_canonical(&mut ready);
        ready
    }

    /// Returns open tasks that are blocked, with their blockers, in canonical order
    pub fn blocked(&self) -> Vec<(&Task, Vec<TaskId>)> {
        let mut blocked: Vec<&Task> = self
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Open && self.is_blocked(&t.id))
            .collect();
        sort_canonical(&mut blocked);
        blocked
            .into_iter()
            .map(|t| (t, self.blocked_by(&t.id)))
            .collect()
    }

    /// Returns the tasks that depend on the given task, in snapshot order
    pub fn dependents(&self, id: &TaskId) -> Vec<TaskId> {
        let mut positions: Vec<usize> = self
            .dependent_nodes(id)
            .filter_map(|node| self.index.get(&self.graph[node]).copied())
            .collect();
        positions.sort_unstable();
        positions
            .into_iter()
            .map(|i| self.tasks[i].id.clone())
            .collect()
    }

    fn dependent_nodes(&self, id: &TaskId) -> impl Iterator<Item = NodeIndex> + '_ {
        self.node_map
            .get(id)
            .into_iter()
            .flat_map(move |&idx| self.graph.neighbors_directed(idx, Direction::Incoming))
    }

    /// Returns true if the stored dependencies already contain a cycle
    pub fn has_cycle(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Builds a display forest where each node's children are the tasks it blocks
    ///
    /// Roots are tasks with no resolvable dependency. Each task appears once,
    /// under the first parent reached in canonical order. Tasks only reachable
    /// through a cycle in stored data are appended as extra roots.
    pub fn display_tree(&self) -> Vec<TreeNode<'_>> {
        let mut visited = HashSet::new();

        let mut roots: Vec<&Task> = self
            .tasks
            .iter()
            .filter(|t| !t.depends_on.iter().any(|dep| self.contains(dep)))
            .collect();
        sort_canonical(&mut roots);

        let mut forest = Vec::new();
        for root in roots {
            if !visited.contains(&root.id) {
                forest.push(self.build_node(root, &mut visited));
            }
        }

        let mut leftovers: Vec<&Task> = self
            .tasks
            .iter()
            .filter(|t| !visited.contains(&t.id))
            .collect();
        sort_canonical(&mut leftovers);
        for task in leftovers {
            if !visited.contains(&task.id) {
                forest.push(self.build_node(task, &mut visited));
            }
        }

        forest
    }

    fn build_node<'a>(&'a self, task: &'a Task, visited: &mut HashSet<TaskId>) -> TreeNode<'a> {
        visited.insert(task.id.clone());

        let mut dependents: Vec<&Task> = self
            .dependent_nodes(&task.id)
            .filter_map(|node| self.get(&self.graph[node]))
            .collect();
        sort_canonical(&mut dependents);

        let mut children = Vec::new();
        for child in dependents {
            if !visited.contains(&child.id) {
                children.push(self.build_node(child, visited));
            }
        }

        TreeNode { task, children }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::task::Priority;
    use chrono::{Duration, Utc};

    fn id(s: &str) -> TaskId {
        s.parse().unwrap()
    }

    fn make_task(name: &str, status: TaskStatus, deps: &[&str]) -> Task {
        let mut task = Task::new(id(name), format!("Task {}", name), Priority::Medium);
        task.status = status;
        task.depends_on = deps.iter().map(|d| id(d)).collect();
        task
    }

    fn ids(tasks: &[&Task]) -> Vec<String> {
        tasks.iter().map(|t| t.id.to_string()).collect()
    }

    #[test]
    fn empty_graph() {
        let graph = DependencyGraph::from_tasks(vec![]);
        assert!(graph.is_empty());
        assert_eq!(graph.len(), 0);
        assert!(graph.ready().is_empty());
        assert!(graph.display_tree().is_empty());
    }

    #[test]
    fn is_blocked() {
        let graph = DependencyGraph::from_tasks(vec![
            make_task("a", TaskStatus::Open, &[]),
            make_task("b", TaskStatus::Open, &["a"]),
            make_task("c", TaskStatus::Closed, &[]),
            make_task("d", TaskStatus::Open, &["c"]),
        ]);

        assert!(!graph.is_blocked(&id("a")));
        assert!(graph.is_blocked(&id("b")));
        assert!(!graph.is_blocked(&id("c")));
        assert!(!graph.is_blocked(&id("d")));
    }

    #[test]
    fn unknown_task_is_not_blocked() {
        let graph = DependencyGraph::from_tasks(vec![make_task("a", TaskStatus::Open, &[])]);
        assert!(!graph.is_blocked(&id("zzz")));
        assert!(graph.blocked_by(&id("zzz")).is_empty());
    }

    #[test]
    fn dangling_dependency_does_not_block() {
        let graph = DependencyGraph::from_tasks(vec![make_task("a", TaskStatus::Open, &["gone"])]);
        assert!(!graph.is_blocked(&id("a")));
        assert_eq!(ids(&graph.ready()), vec!["a"]);
    }

    #[test]
    fn blocked_by_preserves_dependency_order() {
        let graph = DependencyGraph::from_tasks(vec![
            make_task("a", TaskStatus::Open, &[]),
            make_task("b", TaskStatus::Active, &[]),
            make_task("x", TaskStatus::Closed, &[]),
            make_task("c", TaskStatus::Open, &["b", "x", "missing", "a"]),
        ]);

        assert_eq!(graph.blocked_by(&id("c")), vec![id("b"), id("a")]);
    }

    #[test]
    fn would_create_cycle() {
        // a -> b -> c (a depends on b, b depends on c)
        let graph = DependencyGraph::from_tasks(vec![
            make_task("a", TaskStatus::Open, &["b"]),
            make_task("b", TaskStatus::Open, &["c"]),
            make_task("c", TaskStatus::Open, &[]),
        ]);

        assert!(graph.would_create_cycle(&id("c"), &id("a")));
        assert!(graph.would_create_cycle(&id("c"), &id("b")));
        assert!(!graph.would_create_cycle(&id("a"), &id("c")));
        assert!(!graph.would_create_cycle(&id("c"), &id("d")));
    }

    #[test]
    fn self_edge_is_a_cycle() {
        let graph = DependencyGraph::from_tasks(vec![make_task("a", TaskStatus::Open, &[])]);
        assert!(graph.would_create_cycle(&id("a"), &id("a")));
        assert!(matches!(
            graph.validate_add_dependency(&id("a"), &id("a")),
            Err(TaskError::CycleDetected { .. })
        ));
    }

    #[test]
    fn cycle_walk_treats_missing_targets_as_dead_ends() {
        // b depends on a task that does not exist; the walk must not fail on it
        let graph = DependencyGraph::from_tasks(vec![
            make_task("a", TaskStatus::Open, &[]),
            make_task("b", TaskStatus::Open, &["ghost"]),
        ]);

        assert!(!graph.would_create_cycle(&id("a"), &id("b")));
    }

    #[test]
    fn validate_add_dependency() {
        let graph = DependencyGraph::from_tasks(vec![
            make_task("a", TaskStatus::Open, &["b"]),
            make_task("b", TaskStatus::Open, &[]),
        ]);

        assert!(matches!(
            graph.validate_add_dependency(&id("b"), &id("a")),
            Err(TaskError::CycleDetected { from, to }) if from == id("b") && to == id("a")
        ));
        assert!(graph.validate_add_dependency(&id("a"), &id("b")).is_ok());
        assert!(matches!(
            graph.validate_add_dependency(&id("x"), &id("a")),
            Err(TaskError::TaskNotFound { id: missing }) if missing == id("x")
        ));
        assert!(matches!(
            graph.validate_add_dependency(&id("a"), &id("y")),
            Err(TaskError::TaskNotFound { id: missing }) if missing == id("y")
        ));
    }

    #[test]
    fn existence_is_checked_before_cycles() {
        // "ghost" is referenced but absent, so the cycle walk would reach it;
        // the existence check must win
        let graph = DependencyGraph::from_tasks(vec![make_task("b", TaskStatus::Open, &["ghost"])]);

        assert!(graph.would_create_cycle(&id("ghost"), &id("b")));
        assert!(matches!(
            graph.validate_add_dependency(&id("ghost"), &id("b")),
            Err(TaskError::TaskNotFound { .. })
        ));
    }

    #[test]
    fn ready_excludes_blocked_and_non_open() {
        let graph = DependencyGraph::from_tasks(vec![
            make_task("a", TaskStatus::Open, &[]),
            make_task("b", TaskStatus::Open, &["a"]),
            make_task("c", TaskStatus::Closed, &[]),
            make_task("d", TaskStatus::Open, &["c"]),
            make_task("e", TaskStatus::Active, &[]),
        ]);

        let mut ready = ids(&graph.ready());
        ready.sort();
        assert_eq!(ready, vec!["a", "d"]);
    }

    #[test]
    fn ready_orders_by_priority_then_creation() {
        let base = Utc::now();
        let mut low = make_task("l", TaskStatus::Open, &[]);
        low.priority = Priority::Low;
        low.created_at = base;
        let mut critical = make_task("c", TaskStatus::Open, &[]);
        critical.priority = Priority::Critical;
        critical.created_at = base + Duration::seconds(1);
        let mut high = make_task("h", TaskStatus::Open, &[]);
        high.priority = Priority::High;
        high.created_at = base + Duration::seconds(2);
        let mut odd = make_task("o", TaskStatus::Open, &[]);
        odd.priority = Priority::Other("someday".to_string());
        odd.created_at = base - Duration::seconds(10);

        let graph = DependencyGraph::from_tasks(vec![low, critical, high, odd]);
        assert_eq!(ids(&graph.ready()), vec!["c", "h", "l", "o"]);

        let roots: Vec<String> = graph
            .display_tree()
            .iter()
            .map(|n| n.task.id.to_string())
            .collect();
        assert_eq!(roots, vec!["c", "h", "l", "o"]);
    }

    #[test]
    fn blocked_lists_blockers() {
        let graph = DependencyGraph::from_tasks(vec![
            make_task("a", TaskStatus::Open, &[]),
            make_task("b", TaskStatus::Open, &["a"]),
            make_task("c", TaskStatus::Closed, &["a"]),
        ]);

        let blocked = graph.blocked();
        assert_eq!(blocked.len(), 1);
        assert_eq!(blocked[0].0.id, id("b"));
        assert_eq!(blocked[0].1, vec![id("a")]);
    }

    #[test]
    fn dependents_in_snapshot_order() {
        let graph = DependencyGraph::from_tasks(vec![
            make_task("a", TaskStatus::Open, &[]),
            make_task("b", TaskStatus::Open, &["a"]),
            make_task("c", TaskStatus::Open, &["a"]),
            make_task("d", TaskStatus::Open, &["b"]),
        ]);

        assert_eq!(graph.dependents(&id("a")), vec![id("b"), id("c")]);
        assert_eq!(graph.dependents(&id("b")), vec![id("d")]);
        assert!(graph.dependents(&id("d")).is_empty());
        assert!(graph.dependents(&id("nope")).is_empty());
    }

    #[test]
    fn display_tree_nests_blocked_tasks_under_blockers() {
        let graph = DependencyGraph::from_tasks(vec![
            make_task("a", TaskStatus::Open, &[]),
            make_task("b", TaskStatus::Open, &["a"]),
            make_task("c", TaskStatus::Open, &["b"]),
            make_task("z", TaskStatus::Closed, &[]),
        ]);

        let forest = graph.display_tree();
        assert_eq!(forest.len(), 2);

        let a = forest.iter().find(|n| n.task.id == id("a")).unwrap();
        assert_eq!(a.children.len(), 1);
        assert_eq!(a.children[0].task.id, id("b"));
        assert_eq!(a.children[0].children[0].task.id, id("c"));
    }

    #[test]
    fn display_tree_shows_shared_dependent_once() {
        // d depends on both b and c, which both depend on a
        let base = Utc::now();
        let mut tasks = vec![
            make_task("a", TaskStatus::Open, &[]),
            make_task("b", TaskStatus::Open, &["a"]),
            make_task("c", TaskStatus::Open, &["a"]),
            make_task("d", TaskStatus::Open, &["b", "c"]),
        ];
        for (i, t) in tasks.iter_mut().enumerate() {
            t.created_at = base + Duration::seconds(i as i64);
        }

        let graph = DependencyGraph::from_tasks(tasks);
        let forest = graph.display_tree();

        assert_eq!(forest.len(), 1);
        let a = &forest[0];
        assert_eq!(a.children.len(), 2);
        assert_eq!(a.children[0].task.id, id("b"));
        assert_eq!(a.children[0].children[0].task.id, id("d"));
        assert!(a.children[1].children.is_empty());
    }

    #[test]
    fn display_tree_survives_stored_cycle() {
        // Corrupt data: a and b depend on each other
        let graph = DependencyGraph::from_tasks(vec![
            make_task("a", TaskStatus::Open, &["b"]),
            make_task("b", TaskStatus::Open, &["a"]),
        ]);

        assert!(graph.has_cycle());

        let forest = graph.display_tree();
        let mut seen = Vec::new();
        fn walk(node: &TreeNode<'_>, seen: &mut Vec<String>) {
            seen.push(node.task.id.to_string());
            for child in &node.children {
                walk(child, seen);
            }
        }
        for node in &forest {
            walk(node, &mut seen);
        }
        seen.sort();
        assert_eq!(seen, vec!["a", "b"]);
    }

    #[test]
    fn active_task_lookup() {
        let graph = DependencyGraph::from_tasks(vec![
            make_task("a", TaskStatus::Open, &[]),
            make_task("b", TaskStatus::Active, &[]),
        ]);
        assert_eq!(graph.active().map(|t| t.id.clone()), Some(id("b")));
    }

    #[test]
    fn duplicate_ids_keep_first() {
        let graph = DependencyGraph::from_tasks(vec![
            make_task("a", TaskStatus::Open, &[]),
            make_task("a", TaskStatus::Closed, &[]),
        ]);
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.get(&id("a")).unwrap().status, TaskStatus::Open);
    }

    #[test]
    fn performance_500_tasks() {
        use std::time::Instant;

        let tasks: Vec<Task> = (0..500)
            .map(|i| {
                let name = format!("t{}", i);
                let deps: Vec<String> = if i > 0 {
                    vec![format!("t{}", i - 1)]
                } else {
                    vec![]
                };
                let dep_refs: Vec<&str> = deps.iter().map(String::as_str).collect();
                make_task(&name, TaskStatus::Open, &dep_refs)
            })
            .collect();

        let start = Instant::now();
        let graph = DependencyGraph::from_tasks(tasks);
        let _ready = graph.ready();
        let cycle = graph.would_create_cycle(&id("t0"), &id("t499"));
        let duration = start.elapsed();

        assert!(cycle);
        assert!(duration.as_millis() < 500, "Graph queries took {:?}", duration);
    }
}
