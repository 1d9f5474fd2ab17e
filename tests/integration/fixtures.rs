//! Test fixtures for integration tests.
//!
//! Provides helpers for:
//! - A scripted `ApiClient` with canned bodies, failures and a call log
//! - The shipped descriptor catalog
//! - Sessions writing into temporary directories

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::TempDir;

use mock_harvest::config::Config;
use mock_harvest::endpoint::{
    ApiClient, ApiRequest, ApiResponse, Catalog, EndpointAdapter, Operation, SubOperation,
};
use mock_harvest::harvest::HarvestSession;
use mock_harvest::recorder::MockRecorder;
use mock_harvest::{Error, Result};

/// In-memory API answering from a script.
///
/// Targets are `operation` or `operation.sub` wire names. Unscripted
/// targets get a plausible default body.
#[derive(Default)]
pub struct FakeApiClient {
    responses: HashMap<String, Value>,
    failures: HashMap<String, u16>,
    unsupported: HashSet<String>,
    calls: Mutex<Vec<ApiRequest>>,
    token: Mutex<Option<String>>,
    next_id: AtomicUsize,
}

impl FakeApiClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `target` with `body`.
    pub fn respond(mut self, target: &str, body: Value) -> Self {
        self.responses.insert(target.to_string(), body);
        self
    }

    /// Fail every call to `target` with `status`.
    pub fn fail(mut self, target: &str, status: u16) -> Self {
        self.failures.insert(target.to_string(), status);
        self
    }

    /// Report `target` as not implemented by the client.
    pub fn without(mut self, target: &str) -> Self {
        self.unsupported.insert(target.to_string());
        self
    }

    pub fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, target: &str) -> Vec<ApiRequest> {
        self.calls()
            .into_iter()
            .filter(|call| call.target() == target)
            .collect()
    }

    pub fn count(&self, target: &str) -> usize {
        self.calls_to(target).len()
    }

    /// Token passed to `authorize`, if any.
    pub fn token(&self) -> Option<String> {
        self.token.lock().unwrap().clone()
    }

    fn default_body(&self, request: &ApiRequest) -> Value {
        let payload = request.args.first().cloned().unwrap_or(Value::Null);
        match (request.operation, request.sub) {
            (Operation::GetToken, None) => json!({ "token": "t0k3n" }),
            (Operation::GetUser, None) => json!({ "id": "me", "email": "root@anyfetch.test" }),
            (Operation::PostUsers, None) => {
                let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                json!({ "id": format!("user-{}", n), "email": payload["email"] })
            }
            (Operation::PostSubcompanies, None) => {
                json!({ "id": "sub-1", "name": payload["name"], "user": payload["user"] })
            }
            (Operation::PostDocuments, None) => {
                json!({ "id": "doc-1", "identifier": payload["identifier"] })
            }
            (Operation::DeleteSubcompanyById, None)
            | (Operation::DeleteDocumentsByIdentifier, None)
            | (Operation::DeleteUserById, None) => Value::Null,
            _ => json!({ "target": request.target(), "args": request.args }),
        }
    }
}

#[async_trait]
impl ApiClient for FakeApiClient {
    async fn call(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.calls.lock().unwrap().push(request.clone());
        let target = request.target();

        if let Some(status) = self.failures.get(&target) {
            return Err(Error::RemoteCall {
                operation: target,
                status: Some(*status),
                message: "scripted failure".to_string(),
            });
        }

        let body = match self.responses.get(&target) {
            Some(body) => body.clone(),
            None => self.default_body(&request),
        };
        Ok(ApiResponse::new(request.descriptor.expected_status, body))
    }

    fn supports(&self, op: Operation, sub: Option<SubOperation>) -> bool {
        let target = match sub {
            Some(sub) => format!("{}.{}", op, sub),
            None => op.to_string(),
        };
        !self.unsupported.contains(&target)
    }

    fn authorize(&self, token: &str) {
        *self.token.lock().unwrap() = Some(token.to_string());
    }
}

/// The catalog shipped in `config/descriptors.json`.
pub fn shipped_catalog() -> Catalog {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config/descriptors.json");
    Catalog::load(&path).expect("Failed to load shipped catalog")
}

/// A session over a fake client, writing into a temporary directory.
pub struct Harness {
    pub temp_dir: TempDir,
    pub client: Arc<FakeApiClient>,
    pub session: HarvestSession,
}

impl Harness {
    pub fn new(client: FakeApiClient) -> Self {
        Self::with(client, shipped_catalog(), Config::default())
    }

    pub fn with(client: FakeApiClient, catalog: Catalog, config: Config) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        Self::in_dir(temp_dir, client, catalog, config)
    }

    /// Reuse an existing directory, e.g. for a second run.
    pub fn in_dir(
        temp_dir: TempDir,
        client: FakeApiClient,
        catalog: Catalog,
        config: Config,
    ) -> Self {
        let client = Arc::new(client);
        let adapter = EndpointAdapter::new(Arc::new(catalog), client.clone());
        let recorder = MockRecorder::new(temp_dir.path().join("mocks"));
        let session = HarvestSession::new(adapter, recorder, &config);
        Self {
            temp_dir,
            client,
            session,
        }
    }

    pub fn mocks_dir(&self) -> PathBuf {
        self.temp_dir.path().join("mocks")
    }

    /// Fixture file names currently in the mocks directory, sorted.
    pub fn fixture_files(&self) -> Vec<String> {
        let mut names: Vec<String> = match std::fs::read_dir(self.mocks_dir()) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().to_string())
                .collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }

    pub fn read_fixture(&self, name: &str) -> Value {
        let text = std::fs::read_to_string(self.mocks_dir().join(name))
            .expect("Failed to read fixture");
        serde_json::from_str(&text).expect("Fixture is not JSON")
    }
}
