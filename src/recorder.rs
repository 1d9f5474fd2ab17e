//! Mock recorder: decides whether a response is worth a fixture and writes it.
//!
//! Fixture names are a pure function of the operation descriptor, so a
//! second run overwrites the files of the first instead of adding new ones.

use crate::endpoint::catalog::OperationDescriptor;
use crate::error::{Error, Result};
use crate::{hlog, hlog_debug};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Whether `body` has anything worth replaying.
pub fn has_observable_fields(body: &Value) -> bool {
    match body {
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::String(s) => !s.is_empty(),
        Value::Null | Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Recording policy: skip no-content operations and empty bodies.
pub fn should_record(descriptor: &OperationDescriptor, body: &Value) -> bool {
    !descriptor.expects_no_content() && has_observable_fields(body)
}

/// Deterministic fixture file name for a descriptor, e.g. `GET-documents-id-raw.json`.
pub fn fixture_name(descriptor: &OperationDescriptor) -> String {
    let segments: Vec<String> = descriptor
        .endpoint
        .split('/')
        .map(|segment| {
            segment
                .trim_start_matches(':')
                .trim_start_matches('{')
                .trim_end_matches('}')
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '-' })
                .collect::<String>()
        })
        .filter(|segment| !segment.is_empty())
        .collect();

    let slug = if segments.is_empty() {
        "root".to_string()
    } else {
        segments.join("-")
    };
    format!("{}-{}.json", descriptor.verb.to_uppercase(), slug)
}

/// Writes fixtures into a mocks directory.
#[derive(Debug)]
pub struct MockRecorder {
    mocks_dir: PathBuf,
    written: Mutex<Vec<PathBuf>>,
}

impl MockRecorder {
    pub fn new(mocks_dir: impl Into<PathBuf>) -> Self {
        Self {
            mocks_dir: mocks_dir.into(),
            written: Mutex::new(Vec::new()),
        }
    }

    pub fn mocks_dir(&self) -> &Path {
        &self.mocks_dir
    }

    /// Create the mocks directory if needed.
    pub async fn ensure_dir(&self) -> Result<()> {
        hlog_debug!("Ensuring mocks directory {}", self.mocks_dir.display());
        tokio::fs::create_dir_all(&self.mocks_dir)
            .await
            .map_err(|source| Error::Persistence {
                path: self.mocks_dir.clone(),
                source,
            })
    }

    /// Target path of the fixture for `descriptor`.
    pub fn fixture_path(&self, descriptor: &OperationDescriptor) -> PathBuf {
        self.mocks_dir.join(fixture_name(descriptor))
    }

    /// Persist `body` as pretty JSON unless the policy says it is not worth it.
    ///
    /// Returns the written path, or `None` when the response was skipped.
    pub async fn record(
        &self,
        descriptor: &OperationDescriptor,
        body: &Value,
    ) -> Result<Option<PathBuf>> {
        if !should_record(descriptor, body) {
            hlog_debug!(
                "Skipping fixture {} (status {}, empty body: {})",
                fixture_name(descriptor),
                descriptor.expected_status,
                !has_observable_fields(body)
            );
            return Ok(None);
        }

        let path = self.fixture_path(descriptor);
        let json = serde_json::to_string_pretty(body)?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|source| Error::Persistence {
                path: path.clone(),
                source,
            })?;
        hlog!("{} saved.", fixture_name(descriptor));

        if let Ok(mut written) = self.written.lock() {
            written.push(path.clone());
        }
        Ok(Some(path))
    }

    /// Fixture paths written so far, in write order.
    pub fn written(&self) -> Vec<PathBuf> {
        self.written
            .lock()
            .map(|written| written.clone())
            .unwrap_or_default()
    }
}
