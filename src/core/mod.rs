//! Core model of the task graph: tasks, the result store and the DAG.

pub mod dag;
pub mod store;
pub mod task;

pub use dag::{TaskGraph, TaskGraphBuilder};
pub use store::{ResultStore, TaskInputs};
pub use task::{TaskFn, TaskFuture, TaskSpec, TaskState};
