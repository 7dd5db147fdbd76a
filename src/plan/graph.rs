// src/plan/graph.rs

//! Read-only dependency and containment queries over a task snapshot.
//!
//! Nodes live in an index arena in plan order. Every traversal uses an
//! explicit work stack plus a visited set, so malformed (cyclic) input
//! always terminates.

use std::collections::{HashMap, HashSet};

use crate::plan::task::{Task, TaskId};
use crate::types::TaskStatus;

#[derive(Debug, Clone)]
struct GraphNode {
    id: TaskId,
    /// Direct dependencies that exist in the plan (self-links dropped).
    deps: Vec<usize>,
    /// Tasks that list this one in their `depends_on`.
    dependents: Vec<usize>,
    /// Tasks whose `parent_id` points here.
    children: Vec<usize>,
}

/// Adjacency view of a task collection keyed by task id.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    nodes: Vec<GraphNode>,
    index: HashMap<TaskId, usize>,
}

impl TaskGraph {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let index: HashMap<TaskId, usize> = tasks
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id.clone(), i))
            .collect();

        let mut nodes: Vec<GraphNode> = tasks
            .iter()
            .map(|t| GraphNode {
                id: t.id.clone(),
                deps: Vec::new(),
                dependents: Vec::new(),
                children: Vec::new(),
            })
            .collect();

        for (i, task) in tasks.iter().enumerate() {
            let mut seen = HashSet::new();
            for dep in &task.depends_on {
                let Some(&d) = index.get(dep) else {
                    continue;
                };
                if d == i || !seen.insert(d) {
                    continue;
                }
                nodes[i].deps.push(d);
                nodes[d].dependents.push(i);
            }

            if let Some(parent) = task.parent_id.as_ref() {
                if let Some(&p) = index.get(parent) {
                    if p != i {
                        nodes[p].children.push(i);
                    }
                }
            }
        }

        Self { nodes, index }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.index.contains_key(id)
    }

    /// Position of the task in plan order.
    pub fn index_of(&self, id: &TaskId) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Task id stored at a plan position.
    pub fn id_at(&self, idx: usize) -> &TaskId {
        &self.nodes[idx].id
    }

    /// Resolved direct dependencies (plan positions).
    pub fn dep_indices(&self, idx: usize) -> &[usize] {
        &self.nodes[idx].deps
    }

    /// Direct dependents (plan positions).
    pub fn dependent_indices(&self, idx: usize) -> &[usize] {
        &self.nodes[idx].dependents
    }

    /// Immediate dependencies of a task that exist in the plan.
    pub fn dependencies_of(&self, id: &TaskId) -> Vec<&TaskId> {
        self.neighbours(id, |n| &n.deps)
    }

    /// Immediate dependents of a task.
    pub fn dependents_of(&self, id: &TaskId) -> Vec<&TaskId> {
        self.neighbours(id, |n| &n.dependents)
    }

    /// Tasks whose `parent_id` is `id`.
    pub fn children_of(&self, id: &TaskId) -> Vec<&TaskId> {
        self.neighbours(id, |n| &n.children)
    }

    /// A container is any task referenced as some other task's parent.
    pub fn is_container(&self, id: &TaskId) -> bool {
        self.index
            .get(id)
            .is_some_and(|&i| !self.nodes[i].children.is_empty())
    }

    /// Every task `id` transitively depends on.
    pub fn ancestors(&self, id: &TaskId) -> HashSet<TaskId> {
        self.reach(id, |n| &n.deps)
    }

    /// Every task that transitively depends on `id`.
    pub fn descendants(&self, id: &TaskId) -> HashSet<TaskId> {
        self.reach(id, |n| &n.dependents)
    }

    /// Whether following `depends_on` edges from `from` reaches `to`.
    pub fn has_path(&self, from: &TaskId, to: &TaskId) -> bool {
        let (Some(&start), Some(&goal)) = (self.index.get(from), self.index.get(to)) else {
            return false;
        };

        let mut stack = vec![start];
        let mut visited = vec![false; self.nodes.len()];

        while let Some(i) = stack.pop() {
            if std::mem::replace(&mut visited[i], true) {
                continue;
            }
            for &d in &self.nodes[i].deps {
                if d == goal {
                    return true;
                }
                stack.push(d);
            }
        }

        false
    }

    fn neighbours<'a>(
        &'a self,
        id: &TaskId,
        edges: impl Fn(&GraphNode) -> &Vec<usize>,
    ) -> Vec<&'a TaskId> {
        match self.index.get(id) {
            Some(&i) => edges(&self.nodes[i])
                .iter()
                .map(|&j| &self.nodes[j].id)
                .collect(),
            None => Vec::new(),
        }
    }

    fn reach(&self, id: &TaskId, edges: impl Fn(&GraphNode) -> &Vec<usize>) -> HashSet<TaskId> {
        let mut out = HashSet::new();
        let Some(&start) = self.index.get(id) else {
            return out;
        };

        let mut stack: Vec<usize> = edges(&self.nodes[start]).clone();
        let mut visited = vec![false; self.nodes.len()];

        while let Some(i) = stack.pop() {
            if std::mem::replace(&mut visited[i], true) {
                continue;
            }
            if i != start {
                out.insert(self.nodes[i].id.clone());
            }
            stack.extend(edges(&self.nodes[i]).iter().copied());
        }

        out
    }
}

/// Whether every resolvable dependency of `task` is `Completed`.
///
/// An empty dependency list counts as satisfied. Ids that do not resolve
/// to a task in `tasks` are ignored, the same way the scheduler treats them.
pub fn deps_completed(task: &Task, tasks: &[Task]) -> bool {
    task.depends_on.iter().filter(|dep| **dep != task.id).all(|dep| {
        tasks
            .iter()
            .find(|t| &t.id == dep)
            .is_none_or(|t| t.status == TaskStatus::Completed)
    })
}

/// Ids of every task referenced as a parent by another task.
pub fn container_ids(tasks: &[Task]) -> HashSet<TaskId> {
    let ids: HashSet<&TaskId> = tasks.iter().map(|t| &t.id).collect();
    tasks
        .iter()
        .filter_map(|t| t.parent_id.as_ref().filter(|p| **p != t.id))
        .filter(|p| ids.contains(p))
        .cloned()
        .collect()
}
