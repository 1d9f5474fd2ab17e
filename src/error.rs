use std::path::PathBuf;

use thiserror::Error;

/// A single teardown action that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupFailure {
    /// Name of the cleanup action.
    pub action: String,
    /// Rendered error of the action.
    pub message: String,
}

impl std::fmt::Display for CleanupFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.action, self.message)
    }
}

fn join_failures(failures: &[CleanupFailure]) -> String {
    failures
        .iter()
        .map(|failure| failure.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Invalid task graph: {0}")]
    GraphDefinition(String),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Remote call {operation} failed: {message}")]
    RemoteCall {
        operation: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Failed to write fixture {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cleanup failed: {}", join_failures(.0))]
    Cleanup(Vec<CleanupFailure>),

    #[error("Task {task} cannot proceed: {detail}")]
    MissingValue { task: String, detail: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Task join error: {0}")]
    TaskJoin(String),
}

impl Error {
    /// Status code reported by the remote service, if the error came from one.
    pub fn remote_status(&self) -> Option<u16> {
        match self {
            Error::RemoteCall { status, .. } => *status,
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
