//! Orchestration layer: runs a validated task graph to completion.
//!
//! The [`GraphExecutor`] owns the readiness bookkeeping and the result store
//! for a single run and reports a [`RunOutcome`].

pub mod scheduler;

pub use scheduler::{GraphExecutor, RunOutcome, SchedulerEvent};
