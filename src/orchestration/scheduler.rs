//! Scheduler for parallel task execution.
//!
//! The executor drives a [`TaskGraph`] to completion: every task whose
//! dependencies have all completed is spawned on the tokio runtime, and a
//! completion unlocks its dependents. The first failure stops new work;
//! tasks already running are left to finish.

use crate::core::dag::TaskGraph;
use crate::core::store::ResultStore;
use crate::core::task::TaskState;
use crate::error::{Error, Result};
use crate::{hlog_debug, hlog_error, hlog_warn};
use futures::stream::{FuturesUnordered, StreamExt};
use petgraph::graph::NodeIndex;
use std::collections::{HashMap, VecDeque};
use tokio::sync::mpsc;

/// Events emitted by the executor for task lifecycle changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// A task was spawned.
    TaskStarted {
        /// The task that was started.
        task: String,
    },
    /// A task completed successfully.
    TaskCompleted {
        /// The task that completed.
        task: String,
    },
    /// A task failed with an error.
    TaskFailed {
        /// The task that failed.
        task: String,
        /// Error message describing the failure.
        error: String,
    },
    /// No task is running and none can start any more.
    GraphSettled {
        /// Whether every task completed.
        success: bool,
    },
}

/// Result of running a graph.
#[derive(Debug)]
pub enum RunOutcome<V> {
    /// Every task completed.
    Success(ResultStore<V>),
    /// A task failed; `partial` holds every value produced before the graph settled.
    Failure {
        error: Error,
        partial: ResultStore<V>,
    },
}

impl<V> RunOutcome<V> {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success(_))
    }

    /// The (possibly partial) result store.
    pub fn store(&self) -> &ResultStore<V> {
        match self {
            RunOutcome::Success(store) => store,
            RunOutcome::Failure { partial, .. } => partial,
        }
    }

    /// The first error, if the run failed.
    pub fn error(&self) -> Option<&Error> {
        match self {
            RunOutcome::Success(_) => None,
            RunOutcome::Failure { error, .. } => Some(error),
        }
    }

    pub fn into_result(self) -> Result<ResultStore<V>> {
        match self {
            RunOutcome::Success(store) => Ok(store),
            RunOutcome::Failure { error, .. } => Err(error),
        }
    }
}

/// Dependency-driven concurrent executor.
///
/// # Example
///
/// ```ignore
/// use mock_harvest::core::TaskGraph;
/// use mock_harvest::orchestration::GraphExecutor;
///
/// let graph = TaskGraph::<u32>::builder()
///     .task("a", &[], |_| async { Ok(1) })
///     .task("b", &["a"], |inputs| async move { Ok(inputs.require("b", "a")? + 1) })
///     .build()?;
/// let outcome = GraphExecutor::new(graph).run().await;
/// ```
pub struct GraphExecutor<V> {
    /// The task dependency graph.
    graph: TaskGraph<V>,
    /// State of each task, indexed by node.
    states: Vec<TaskState>,
    /// Upper bound on concurrently running tasks.
    max_in_flight: Option<usize>,
    /// Channel for emitting scheduler events.
    event_tx: Option<mpsc::Sender<SchedulerEvent>>,
}

impl<V> GraphExecutor<V>
where
    V: Clone + Send + 'static,
{
    pub fn new(graph: TaskGraph<V>) -> Self {
        let states = vec![TaskState::Pending; graph.task_count()];
        Self {
            graph,
            states,
            max_in_flight: None,
            event_tx: None,
        }
    }

    /// Limit how many tasks run at the same time. Zero is treated as one.
    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.max_in_flight = Some(max.max(1));
        self
    }

    /// Emit lifecycle events on `event_tx`.
    ///
    /// Delivery never waits: when the channel is full or closed the event is
    /// dropped with a warning, so the receiver may be drained after `run`.
    pub fn with_events(mut self, event_tx: mpsc::Sender<SchedulerEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    pub fn graph(&self) -> &TaskGraph<V> {
        &self.graph
    }

    /// State of a task after (or before) a run.
    pub fn state(&self, name: &str) -> Option<&TaskState> {
        self.graph
            .node_indices()
            .find(|&i| self.graph.node(i).name() == name)
            .map(|i| &self.states[i.index()])
    }

    /// States of every task, keyed by name.
    pub fn states(&self) -> HashMap<String, TaskState> {
        self.graph
            .node_indices()
            .map(|i| {
                (
                    self.graph.node(i).name().to_string(),
                    self.states[i.index()].clone(),
                )
            })
            .collect()
    }

    fn has_capacity(&self, running: usize) -> bool {
        self.max_in_flight.map_or(true, |max| running < max)
    }

    /// Names of the tasks that never reached `Completed` or `Failed`.
    pub fn unfinished(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .graph
            .node_indices()
            .filter(|i| !self.states[i.index()].is_terminal())
            .map(|i| self.graph.node(i).name())
            .collect();
        names.sort_unstable();
        names
    }

    fn emit(&self, event: SchedulerEvent) {
        let Some(tx) = &self.event_tx else {
            return;
        };
        match tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                hlog_warn!("Event channel full, dropping {:?}", event);
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                hlog_debug!("Event channel closed, dropping {:?}", event);
            }
        }
    }

    /// Run every task of the graph and report the outcome.
    ///
    /// Each call is a fresh run: states and the result store start empty.
    pub async fn run(&mut self) -> RunOutcome<V> {
        let mut remaining: Vec<usize> = vec![0; self.graph.task_count()];
        let mut ready = VecDeque::new();
        for index in self.graph.node_indices() {
            let degree = self.graph.in_degree(index);
            remaining[index.index()] = degree;
            if degree == 0 {
                self.states[index.index()] = TaskState::Ready;
                ready.push_back(index);
            } else {
                self.states[index.index()] = TaskState::Pending;
            }
        }

        let mut store = ResultStore::new();
        let mut first_error: Option<Error> = None;
        let mut in_flight = FuturesUnordered::new();

        loop {
            // Stop feeding new work once something failed.
            if first_error.is_none() {
                while self.has_capacity(in_flight.len()) {
                    let Some(index) = ready.pop_front() else {
                        break;
                    };
                    let spec = self.graph.node(index);
                    let name = spec.name().to_string();
                    let future = spec.invoke(store.snapshot(spec.dependencies()));

                    self.states[index.index()] = TaskState::Running;
                    hlog_debug!("Starting task {} (running: {})", name, in_flight.len() + 1);
                    self.emit(SchedulerEvent::TaskStarted { task: name });

                    let handle = tokio::spawn(future);
                    in_flight.push(async move { (index, handle.await) });
                }
            }

            let Some((index, joined)) = in_flight.next().await else {
                break;
            };
            let name = self.graph.node(index).name().to_string();
            let result = joined
                .map_err(|e| Error::TaskJoin(format!("{}: {}", name, e)))
                .and_then(|r| r);

            match result {
                Ok(value) => {
                    self.states[index.index()] = TaskState::Completed;
                    if let Err(e) = store.insert(&name, value) {
                        hlog_error!("{}", e);
                    }
                    hlog_debug!("Task {} completed", name);
                    self.emit(SchedulerEvent::TaskCompleted { task: name.clone() });

                    if first_error.is_none() {
                        let dependents: Vec<NodeIndex> = self.graph.dependents(index).collect();
                        for dependent in dependents {
                            let count = &mut remaining[dependent.index()];
                            *count = count.saturating_sub(1);
                            if *count == 0 {
                                self.states[dependent.index()] = TaskState::Ready;
                                ready.push_back(dependent);
                            }
                        }
                    }
                }
                Err(error) => {
                    let message = error.to_string();
                    self.states[index.index()] = TaskState::Failed {
                        error: message.clone(),
                    };
                    self.emit(SchedulerEvent::TaskFailed {
                        task: name.clone(),
                        error: message,
                    });

                    if first_error.is_none() {
                        hlog_error!("Task {} failed: {}", name, error);
                        first_error = Some(error);
                    } else {
                        hlog_warn!("Task {} also failed: {}", name, error);
                    }
                }
            }
        }

        let success = first_error.is_none();
        self.emit(SchedulerEvent::GraphSettled { success });
        hlog_debug!(
            "Graph settled: {} of {} tasks completed",
            store.len(),
            self.graph.task_count()
        );
        if !success {
            let never_ran = self.unfinished();
            if !never_ran.is_empty() {
                hlog_warn!("Not run after failure: {}", never_ran.join(", "));
            }
        }

        match first_error {
            None => RunOutcome::Success(store),
            Some(error) => RunOutcome::Failure {
                error,
                partial: store,
            },
        }
    }
}
