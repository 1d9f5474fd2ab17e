//! Endpoint invocation adapter.
//!
//! Resolves an operation against the catalog, forwards the positional
//! arguments to the [`ApiClient`] and normalizes what comes back.

use crate::endpoint::catalog::{Catalog, OperationDescriptor};
use crate::endpoint::client::{ApiClient, ApiRequest, ApiResponse};
use crate::endpoint::operation::{Operation, SubOperation};
use crate::error::{Error, Result};
use crate::{hlog_debug, hlog_warn};
use serde_json::{Map, Value};
use std::sync::Arc;

/// A completed call together with the descriptor it was made for.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub descriptor: OperationDescriptor,
    pub response: ApiResponse,
}

impl Invocation {
    pub fn body(&self) -> &Value {
        &self.response.body
    }

    pub fn into_body(self) -> Value {
        self.response.body
    }
}

/// Invokes catalog operations on an [`ApiClient`].
#[derive(Clone)]
pub struct EndpointAdapter {
    catalog: Arc<Catalog>,
    client: Arc<dyn ApiClient>,
}

impl EndpointAdapter {
    pub fn new(catalog: Arc<Catalog>, client: Arc<dyn ApiClient>) -> Self {
        Self { catalog, client }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn client(&self) -> &Arc<dyn ApiClient> {
        &self.client
    }

    /// Check up front that every operation in `ops` can be invoked.
    pub fn resolve_all(&self, ops: &[Operation]) -> Result<()> {
        for op in ops {
            self.resolve(*op, None)?;
        }
        Ok(())
    }

    fn resolve(&self, op: Operation, sub: Option<SubOperation>) -> Result<OperationDescriptor> {
        let descriptor = match sub {
            Some(sub) => self.catalog.sub_descriptor(op, sub)?,
            None => self.catalog.descriptor(op)?,
        };
        if !self.client.supports(op, sub) {
            let name = match sub {
                Some(sub) => format!("{}.{}", op, sub),
                None => op.to_string(),
            };
            return Err(Error::UnknownOperation(name));
        }
        Ok(descriptor.clone())
    }

    /// Invoke a top-level operation with positional arguments.
    pub async fn invoke(&self, op: Operation, args: Vec<Value>) -> Result<Invocation> {
        let descriptor = self.resolve(op, None)?;
        self.dispatch(op, None, descriptor, args).await
    }

    /// Invoke a sub-operation reachable from `parent` called with `parent_args`.
    pub async fn invoke_sub(
        &self,
        parent: Operation,
        parent_args: Vec<Value>,
        sub: SubOperation,
    ) -> Result<Invocation> {
        let descriptor = self.resolve(parent, Some(sub))?;
        self.dispatch(parent, Some(sub), descriptor, parent_args).await
    }

    async fn dispatch(
        &self,
        operation: Operation,
        sub: Option<SubOperation>,
        descriptor: OperationDescriptor,
        args: Vec<Value>,
    ) -> Result<Invocation> {
        let request = ApiRequest {
            operation,
            sub,
            descriptor: descriptor.clone(),
            args,
        };
        let target = request.target();
        hlog_debug!("Invoking {} ({} args)", target, request.args.len());

        let mut response = self.client.call(request).await?;
        if response.body.is_null() {
            response.body = Value::Object(Map::new());
        }
        if response.status != descriptor.expected_status {
            hlog_warn!(
                "{} answered {} (expected {})",
                target,
                response.status,
                descriptor.expected_status
            );
        }

        Ok(Invocation {
            descriptor,
            response,
        })
    }
}
