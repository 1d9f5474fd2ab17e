//! Remote operations: identifiers, descriptors, the client seam and the
//! adapter the task graph calls through.

pub mod adapter;
pub mod catalog;
pub mod client;
pub mod http;
pub mod operation;

pub use adapter::{EndpointAdapter, Invocation};
pub use catalog::{Catalog, OperationDescriptor, NO_CONTENT};
pub use client::{ApiClient, ApiRequest, ApiResponse};
pub use http::HttpClient;
pub use operation::{Operation, SubOperation};
