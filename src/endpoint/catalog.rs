//! Operation descriptors and the catalog that maps operations to them.

use crate::endpoint::operation::{Operation, SubOperation};
use crate::error::{Error, Result};
use crate::{hlog_debug, hlog_warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Status code of a successful response that carries no content.
pub const NO_CONTENT: u16 = 204;

fn default_verb() -> String {
    "GET".to_string()
}

fn default_status() -> u16 {
    200
}

/// Static metadata describing one remote capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDescriptor {
    /// HTTP verb of the call.
    #[serde(default = "default_verb")]
    pub verb: String,
    /// Path template, e.g. `/documents/{id}`.
    pub endpoint: String,
    /// Status code the call returns on success.
    #[serde(default = "default_status")]
    pub expected_status: u16,
    /// Nested capabilities reachable from this operation's result.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sub_functions: BTreeMap<String, OperationDescriptor>,
}

impl OperationDescriptor {
    pub fn new(verb: &str, endpoint: &str, expected_status: u16) -> Self {
        Self {
            verb: verb.to_string(),
            endpoint: endpoint.to_string(),
            expected_status,
            sub_functions: BTreeMap::new(),
        }
    }

    /// Attach a nested sub-operation descriptor.
    pub fn with_sub(mut self, sub: SubOperation, descriptor: OperationDescriptor) -> Self {
        self.sub_functions.insert(sub.as_str().to_string(), descriptor);
        self
    }

    /// Whether the expected status is the conventional empty-success code.
    pub fn expects_no_content(&self) -> bool {
        self.expected_status == NO_CONTENT
    }

    pub fn sub(&self, sub: SubOperation) -> Option<&OperationDescriptor> {
        self.sub_functions.get(sub.as_str())
    }

    /// Reject descriptors whose endpoint cannot name a distinct fixture.
    ///
    /// An empty endpoint would be recorded under the same file as `/`.
    fn check(&self, name: &str) -> Result<()> {
        if !self.endpoint.starts_with('/') {
            return Err(Error::Config(format!(
                "catalog entry {} has endpoint {:?}, expected a path starting with '/'",
                name, self.endpoint
            )));
        }
        for (sub, nested) in &self.sub_functions {
            nested.check(&format!("{}.{}", name, sub))?;
        }
        Ok(())
    }
}

/// Lookup table from operation to descriptor.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    descriptors: HashMap<Operation, OperationDescriptor>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from a name-keyed map.
    ///
    /// Names that match no known operation are ignored with a warning:
    /// descriptor catalogs usually describe more endpoints than a session
    /// harvests. Every kept entry must have a path endpoint.
    pub fn from_named(named: BTreeMap<String, OperationDescriptor>) -> Result<Self> {
        let mut catalog = Self::new();
        for (name, descriptor) in named {
            match name.parse::<Operation>() {
                Ok(op) => {
                    descriptor.check(&name)?;
                    catalog.insert(op, descriptor);
                }
                Err(_) => hlog_warn!("Catalog entry {} matches no operation, ignoring", name),
            }
        }
        Ok(catalog)
    }

    /// Parse a catalog from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        let named: BTreeMap<String, OperationDescriptor> = serde_json::from_str(json)?;
        Self::from_named(named)
    }

    /// Load a catalog from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        hlog_debug!("Catalog::load path={}", path.display());
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read catalog {}: {}", path.display(), e)))?;
        let catalog = Self::from_json(&text)?;
        hlog_debug!("Catalog loaded with {} operations", catalog.len());
        Ok(catalog)
    }

    pub fn insert(&mut self, op: Operation, descriptor: OperationDescriptor) -> &mut Self {
        self.descriptors.insert(op, descriptor);
        self
    }

    pub fn get(&self, op: Operation) -> Option<&OperationDescriptor> {
        self.descriptors.get(&op)
    }

    /// Descriptor of `op`, or `UnknownOperation`.
    pub fn descriptor(&self, op: Operation) -> Result<&OperationDescriptor> {
        self.get(op).ok_or_else(|| Error::UnknownOperation(op.as_str().to_string()))
    }

    /// Descriptor of a sub-operation nested under `parent`.
    pub fn sub_descriptor(
        &self,
        parent: Operation,
        sub: SubOperation,
    ) -> Result<&OperationDescriptor> {
        self.descriptor(parent)?
            .sub(sub)
            .ok_or_else(|| Error::UnknownOperation(format!("{}.{}", parent, sub)))
    }

    /// Operations and descriptors in a stable order.
    pub fn entries(&self) -> Vec<(Operation, &OperationDescriptor)> {
        let mut entries: Vec<_> = self.descriptors.iter().map(|(op, d)| (*op, d)).collect();
        entries.sort_by_key(|(op, _)| *op);
        entries
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
