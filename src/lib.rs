//! Fixture harvesting for REST APIs.
//!
//! A harvest drives the remote API through a dependency graph of
//! operations, records each response as a JSON fixture and tears down
//! whatever it created.

pub mod cleanup;
pub mod config;
pub mod core;
pub mod endpoint;
pub mod error;
pub mod harvest;
pub mod log;
pub mod orchestration;
pub mod recorder;

pub use error::{Error, Result};
pub use harvest::{HarvestSession, HarvestSummary};
