//! Task model for the execution DAG.
//!
//! A task is a named async function over the values its dependencies
//! produced. Tasks move through `Pending -> Ready -> Running` and end in
//! `Completed` or `Failed`.

use crate::core::store::TaskInputs;
use crate::error::Result;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;

/// Future returned by a task function.
pub type TaskFuture<V> = BoxFuture<'static, Result<V>>;

/// Type-erased task function.
pub type TaskFn<V> = Arc<dyn Fn(TaskInputs<V>) -> TaskFuture<V> + Send + Sync>;

/// Task status in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum TaskState {
    /// Waiting for at least one dependency.
    Pending,
    /// Every dependency completed; waiting to be started.
    Ready,
    /// Currently executing.
    Running,
    /// Finished with a value.
    Completed,
    /// Finished with an error.
    Failed {
        /// Error message describing the failure.
        error: String,
    },
}

impl Default for TaskState {
    fn default() -> Self {
        Self::Pending
    }
}

impl TaskState {
    /// Whether the task reached `Completed` or `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed { .. })
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskState::Pending => write!(f, "pending"),
            TaskState::Ready => write!(f, "ready"),
            TaskState::Running => write!(f, "running"),
            TaskState::Completed => write!(f, "completed"),
            TaskState::Failed { error } => write!(f, "failed: {}", error),
        }
    }
}

/// Declaration of one task: its name, what it waits for and what it does.
pub struct TaskSpec<V> {
    name: String,
    dependencies: Vec<String>,
    run: TaskFn<V>,
}

impl<V: Send + 'static> TaskSpec<V> {
    /// Declare a task from an async closure.
    pub fn new<F, Fut>(name: &str, dependencies: &[&str], f: F) -> Self
    where
        F: Fn(TaskInputs<V>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let run: TaskFn<V> = Arc::new(move |inputs| Box::pin(f(inputs)));
        Self {
            name: name.to_string(),
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
            run,
        }
    }
}

impl<V> TaskSpec<V> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared dependency names, duplicates removed, in declaration order.
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub(crate) fn dedup_dependencies(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.dependencies.retain(|dep| seen.insert(dep.clone()));
    }

    /// Start the task function on the given inputs.
    pub fn invoke(&self, inputs: TaskInputs<V>) -> TaskFuture<V> {
        (self.run)(inputs)
    }
}

impl<V> std::fmt::Debug for TaskSpec<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskSpec")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}
