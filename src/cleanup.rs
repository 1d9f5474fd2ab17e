//! Cleanup coordinator for best-effort teardown of remote resources.
//!
//! Cleanup runs after the task graph settled, whether it succeeded or not.
//! Every action is attempted concurrently; one failing action never stops
//! the others. [`settle`] merges the graph outcome with the cleanup report.

use crate::core::store::ResultStore;
use crate::error::{CleanupFailure, Error, Result};
use crate::orchestration::RunOutcome;
use crate::{hlog, hlog_debug, hlog_error};
use futures::future::{join_all, BoxFuture};
use std::future::Future;
use std::sync::Arc;

type ActionFn<C> = Arc<dyn Fn(Arc<C>) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// A named teardown step over the identifiers captured during a run.
pub struct CleanupAction<C> {
    name: String,
    run: ActionFn<C>,
}

impl<C> CleanupAction<C> {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<C> Clone for CleanupAction<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            run: self.run.clone(),
        }
    }
}

/// Report of cleanup operations performed.
#[derive(Debug, Clone, Default)]
pub struct CleanupReport {
    /// Actions that completed.
    pub succeeded: Vec<String>,
    /// Actions that returned an error or panicked.
    pub failed: Vec<CleanupFailure>,
}

impl CleanupReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether all cleanup operations succeeded.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// `Error::Cleanup` listing every failed action, if any failed.
    pub fn into_result(self) -> Result<()> {
        if self.failed.is_empty() {
            Ok(())
        } else {
            Err(Error::Cleanup(self.failed))
        }
    }
}

/// Runs the registered cleanup actions.
pub struct CleanupCoordinator<C> {
    actions: Vec<CleanupAction<C>>,
}

impl<C> Default for CleanupCoordinator<C> {
    fn default() -> Self {
        Self {
            actions: Vec::new(),
        }
    }
}

impl<C: Send + Sync + 'static> CleanupCoordinator<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a cleanup action.
    pub fn action<F, Fut>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(Arc<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let run: ActionFn<C> = Arc::new(move |captured| Box::pin(f(captured)));
        self.actions.push(CleanupAction {
            name: name.to_string(),
            run,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Registered action names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.actions.iter().map(|a| a.name()).collect()
    }

    /// Run every action concurrently and wait for all of them.
    pub async fn run(&self, captured: C) -> CleanupReport {
        let captured = Arc::new(captured);
        let handles: Vec<_> = self
            .actions
            .iter()
            .map(|action| {
                hlog_debug!("Starting cleanup action {}", action.name);
                tokio::spawn((action.run)(captured.clone()))
            })
            .collect();

        let mut report = CleanupReport::new();
        for (action, joined) in self.actions.iter().zip(join_all(handles).await) {
            match joined {
                Ok(Ok(())) => {
                    hlog!("Cleanup {} done", action.name);
                    report.succeeded.push(action.name.clone());
                }
                Ok(Err(e)) => report.failed.push(CleanupFailure {
                    action: action.name.clone(),
                    message: e.to_string(),
                }),
                Err(e) => report.failed.push(CleanupFailure {
                    action: action.name.clone(),
                    message: Error::TaskJoin(e.to_string()).to_string(),
                }),
            }
        }
        report
    }
}

/// Combine the graph outcome with the cleanup report.
///
/// A graph failure is returned as is and cleanup failures are only logged.
/// Without a graph failure, cleanup failures surface as `Error::Cleanup`.
pub fn settle<V>(outcome: RunOutcome<V>, report: CleanupReport) -> Result<ResultStore<V>> {
    match outcome {
        RunOutcome::Failure { error, .. } => {
            for failure in &report.failed {
                hlog_error!(
                    "Cleanup {} failed after run error: {}",
                    failure.action,
                    failure.message
                );
            }
            Err(error)
        }
        RunOutcome::Success(store) => {
            report.into_result()?;
            Ok(store)
        }
    }
}
