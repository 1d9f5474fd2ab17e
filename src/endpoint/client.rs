//! The seam between the harvester and whatever talks to the remote service.

use crate::endpoint::catalog::OperationDescriptor;
use crate::endpoint::operation::{Operation, SubOperation};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// One call to the remote service.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// The operation, or the parent of `sub`.
    pub operation: Operation,
    /// Set when the call targets a nested sub-operation.
    pub sub: Option<SubOperation>,
    /// Descriptor of the capability actually being called.
    pub descriptor: OperationDescriptor,
    /// Positional arguments, forwarded verbatim.
    pub args: Vec<Value>,
}

impl ApiRequest {
    /// Human readable target, `operation` or `operation.sub`.
    pub fn target(&self) -> String {
        match self.sub {
            Some(sub) => format!("{}.{}", self.operation, sub),
            None => self.operation.to_string(),
        }
    }
}

/// Response of a completed call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }
}

/// A client able to perform every capability of the descriptor catalog.
///
/// Transport, authentication and timeouts are the client's business; every
/// call completes exactly once with either a response or an error.
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Perform one remote call.
    async fn call(&self, request: ApiRequest) -> Result<ApiResponse>;

    /// Whether this client can perform `operation` (optionally its `sub`).
    fn supports(&self, _operation: Operation, _sub: Option<SubOperation>) -> bool {
        true
    }

    /// Switch subsequent calls to the given access token.
    fn authorize(&self, _token: &str) {}
}
