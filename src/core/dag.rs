//! Task DAG (Directed Acyclic Graph) for dependency management.
//!
//! This module provides the TaskGraph structure that represents task
//! dependencies as a validated directed acyclic graph. Edges point from a
//! dependency to the task that waits for it.

use crate::core::store::TaskInputs;
use crate::core::task::TaskSpec;
use crate::error::{Error, Result};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::HashMap;
use std::future::Future;

/// Collects task declarations before validation.
pub struct TaskGraphBuilder<V> {
    specs: Vec<TaskSpec<V>>,
}

impl<V: Send + 'static> TaskGraphBuilder<V> {
    /// Declare a task from an async closure.
    pub fn task<F, Fut>(self, name: &str, dependencies: &[&str], f: F) -> Self
    where
        F: Fn(TaskInputs<V>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        self.spec(TaskSpec::new(name, dependencies, f))
    }
}

impl<V> TaskGraphBuilder<V> {
    /// Declare an already constructed task.
    pub fn spec(mut self, spec: TaskSpec<V>) -> Self {
        self.specs.push(spec);
        self
    }

    /// Validate the declarations and build the graph.
    pub fn build(self) -> Result<TaskGraph<V>> {
        TaskGraph::from_specs(self.specs)
    }
}

/// The validated task dependency graph.
pub struct TaskGraph<V> {
    /// The underlying directed graph.
    graph: DiGraph<TaskSpec<V>, ()>,
    /// Index mapping from task name to NodeIndex for fast lookups.
    task_index: HashMap<String, NodeIndex>,
}

impl<V> TaskGraph<V> {
    pub fn builder() -> TaskGraphBuilder<V> {
        TaskGraphBuilder { specs: Vec::new() }
    }

    /// Build a graph from task declarations.
    ///
    /// # Errors
    /// Returns `GraphDefinition` if:
    /// - Two tasks share a name
    /// - A task depends on a name no task declares
    /// - The dependencies form a cycle (including a task depending on itself)
    pub fn from_specs(specs: Vec<TaskSpec<V>>) -> Result<Self> {
        let mut graph = DiGraph::new();
        let mut task_index = HashMap::new();

        for mut spec in specs {
            if task_index.contains_key(spec.name()) {
                return Err(Error::GraphDefinition(format!(
                    "Task {} is declared more than once",
                    spec.name()
                )));
            }
            spec.dedup_dependencies();
            let name = spec.name().to_string();
            let index = graph.add_node(spec);
            task_index.insert(name, index);
        }

        let mut edges = Vec::new();
        for index in graph.node_indices() {
            let spec = &graph[index];
            for dep in spec.dependencies() {
                let from = task_index.get(dep).ok_or_else(|| {
                    Error::GraphDefinition(format!(
                        "Task {} depends on undeclared task {}",
                        spec.name(),
                        dep
                    ))
                })?;
                edges.push((*from, index));
            }
        }
        for (from, to) in edges {
            graph.add_edge(from, to, ());
        }

        toposort(&graph, None).map_err(|cycle| {
            Error::GraphDefinition(format!(
                "Cycle detected at task: {}",
                graph[cycle.node_id()].name()
            ))
        })?;

        Ok(Self { graph, task_index })
    }

    /// Get a task by its name.
    pub fn get_task(&self, name: &str) -> Option<&TaskSpec<V>> {
        self.task_index.get(name).map(|&index| &self.graph[index])
    }

    pub fn contains_task(&self, name: &str) -> bool {
        self.task_index.contains_key(name)
    }

    pub fn task_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Names of the tasks `name` waits for.
    pub fn dependencies_of(&self, name: &str) -> Vec<&str> {
        self.neighbors(name, Direction::Incoming)
    }

    /// Names of the tasks waiting for `name`.
    pub fn dependents_of(&self, name: &str) -> Vec<&str> {
        self.neighbors(name, Direction::Outgoing)
    }

    fn neighbors(&self, name: &str, direction: Direction) -> Vec<&str> {
        match self.task_index.get(name) {
            Some(&index) => {
                let mut names: Vec<&str> = self
                    .graph
                    .neighbors_directed(index, direction)
                    .map(|n| self.graph[n].name())
                    .collect();
                names.sort_unstable();
                names
            }
            None => Vec::new(),
        }
    }

    /// Task names in an order where each task follows its dependencies.
    pub fn topological_order(&self) -> Vec<&str> {
        // Acyclicity was checked at construction.
        toposort(&self.graph, None)
            .map(|order| order.into_iter().map(|i| self.graph[i].name()).collect())
            .unwrap_or_default()
    }

    /// All task names, sorted.
    pub fn task_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.task_index.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub(crate) fn node_indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    pub(crate) fn node(&self, index: NodeIndex) -> &TaskSpec<V> {
        &self.graph[index]
    }

    pub(crate) fn in_degree(&self, index: NodeIndex) -> usize {
        self.graph
            .neighbors_directed(index, Direction::Incoming)
            .count()
    }

    pub(crate) fn dependents(&self, index: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors_directed(index, Direction::Outgoing)
    }
}

impl<V> std::fmt::Debug for TaskGraph<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskGraph")
            .field("tasks", &self.task_count())
            .field("dependencies", &self.dependency_count())
            .finish()
    }
}
