//! The task graph and its executor.
//!
//! A [`Task`] is a named unit of build work with an explicit list of
//! prerequisite task names. Tasks are collected into a [`Registry`] and
//! validated into a [`TaskGraph`], a directed acyclic graph where an edge
//! points from a prerequisite to its dependent. Running an entry task runs
//! its whole prerequisite closure in topological order.
//!
//! Sibling prerequisites carry no ordering guarantee relative to each other;
//! actions must not assume any. A failing action does not abort the run: the
//! failure is recorded in the [`RunReport`] and every remaining task still
//! executes. This keep-building policy is deliberate, interactive rebuilds
//! should survive one broken source file.

use std::collections::{HashMap, HashSet};
use std::sync::mpsc::Sender;
use std::time::Instant;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use petgraph::Graph;
use petgraph::algo::toposort;
use petgraph::graph::NodeIndex;
use petgraph::visit::{Dfs, Reversed};

use crate::config::BuildConfig;
use crate::error::GraphError;
use crate::paths::PathConfig;

/// Result from a single executed task action.
pub type TaskResult<T> = anyhow::Result<T>;

/// Everything a task action may touch. Constructed per run and passed by
/// reference, there is no ambient global configuration.
pub struct TaskContext<'a> {
    pub config: &'a BuildConfig,
    pub paths: &'a PathConfig,
    /// Reload channel of the dev server, if one is running. Pipelines signal
    /// it after writing output.
    pub reload: Option<Sender<()>>,
}

type ActionFn = Box<dyn Fn(&TaskContext) -> TaskResult<()> + Send + Sync>;

struct TaskNode {
    name: String,
    action: Option<ActionFn>,
}

struct TaskDef {
    name: String,
    prerequisites: Vec<String>,
    action: Option<ActionFn>,
}

/// Accumulates task definitions before validation. Prerequisites may name
/// tasks that are registered later.
#[derive(Default)]
pub struct Registry {
    defs: Vec<TaskDef>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task with an action.
    pub fn task<F>(&mut self, name: &str, prerequisites: &[&str], action: F)
    where
        F: Fn(&TaskContext) -> TaskResult<()> + Send + Sync + 'static,
    {
        self.defs.push(TaskDef {
            name: name.to_string(),
            prerequisites: prerequisites.iter().map(|p| p.to_string()).collect(),
            action: Some(Box::new(action)),
        });
    }

    /// Register a pure grouping task, prerequisites only.
    pub fn group(&mut self, name: &str, prerequisites: &[&str]) {
        self.defs.push(TaskDef {
            name: name.to_string(),
            prerequisites: prerequisites.iter().map(|p| p.to_string()).collect(),
            action: None,
        });
    }

    /// Validate the definitions and build the executable graph. Fails on a
    /// duplicate name, a prerequisite that resolves to no registered task,
    /// or a dependency cycle.
    pub fn finish(self) -> Result<TaskGraph, GraphError> {
        let mut graph = Graph::new();
        let mut index = HashMap::new();

        for def in &self.defs {
            if index.contains_key(&def.name) {
                return Err(GraphError::Duplicate(def.name.clone()));
            }
            let node = graph.add_node(TaskNode {
                name: def.name.clone(),
                action: None,
            });
            index.insert(def.name.clone(), node);
        }

        for def in self.defs {
            let node = index[&def.name];
            for prerequisite in &def.prerequisites {
                let Some(&dep) = index.get(prerequisite) else {
                    return Err(GraphError::UnknownPrerequisite {
                        task: def.name.clone(),
                        prerequisite: prerequisite.clone(),
                    });
                };
                graph.add_edge(dep, node, ());
            }
            graph[node].action = def.action;
        }

        if let Err(cycle) = toposort(&graph, None) {
            return Err(GraphError::Cycle(graph[cycle.node_id()].name.clone()));
        }

        Ok(TaskGraph { graph, index })
    }
}

/// A validated, acyclic task graph.
pub struct TaskGraph {
    graph: Graph<TaskNode, ()>,
    index: HashMap<String, NodeIndex>,
}

// Actions are opaque closures, so only the task names are shown.
impl std::fmt::Debug for TaskGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskGraph")
            .field("tasks", &self.names())
            .finish()
    }
}

/// A task that failed during a run, together with its diagnostic.
pub struct TaskFailure {
    pub task: String,
    pub error: anyhow::Error,
}

/// Outcome of running one entry task and its prerequisite closure.
#[derive(Default)]
pub struct RunReport {
    /// Task names in the order they were executed.
    pub executed: Vec<String>,
    pub failures: Vec<TaskFailure>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

impl TaskGraph {
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All registered task names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.index.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Run `entry` after all of its transitive prerequisites.
    pub fn run(&self, entry: &str, ctx: &TaskContext) -> Result<RunReport, GraphError> {
        let Some(&start) = self.index.get(entry) else {
            return Err(GraphError::UnknownTask(entry.to_string()));
        };

        // The prerequisite closure is every ancestor of the entry node.
        let reversed = Reversed(&self.graph);
        let mut wanted = HashSet::new();
        let mut dfs = Dfs::new(reversed, start);
        while let Some(node) = dfs.next(reversed) {
            wanted.insert(node);
        }

        // The registry rejects cycles, so toposort cannot fail here.
        let order: Vec<_> = toposort(&self.graph, None)
            .map_err(|cycle| GraphError::Cycle(self.graph[cycle.node_id()].name.clone()))?
            .into_iter()
            .filter(|node| wanted.contains(node))
            .collect();

        let s = Instant::now();
        let bar = ProgressBar::new(order.len() as u64).with_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .expect("invalid progress bar template")
                .progress_chars("#>-"),
        );

        let mut report = RunReport::default();
        for node in order {
            let task = &self.graph[node];
            bar.set_message(task.name.clone());

            if let Some(action) = &task.action {
                let started = Instant::now();
                match action(ctx) {
                    Ok(()) => {
                        tracing::debug!(task = %task.name, "finished {}", crate::io::as_overhead(started));
                    }
                    Err(error) => {
                        tracing::error!(task = %task.name, "{}", style(&error).red());
                        report.failures.push(TaskFailure {
                            task: task.name.clone(),
                            error,
                        });
                    }
                }
            }

            report.executed.push(task.name.clone());
            bar.inc(1);
        }

        bar.finish_and_clear();
        tracing::info!(
            "ran '{entry}' ({} tasks, {} failed) {}",
            report.executed.len(),
            report.failures.len(),
            crate::io::as_overhead(s),
        );

        Ok(report)
    }
}
