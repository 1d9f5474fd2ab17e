//! Closed set of remote capabilities the harvester knows how to call.
//!
//! Operations are identified by their camelCase wire names, which are also
//! the keys of the descriptor catalog.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// A top-level remote operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    GetToken,
    GetUser,
    PostUsers,
    PostSubcompanies,
    PostDocuments,
    GetDocuments,
    GetStatus,
    GetIndex,
    GetCompany,
    GetSubcompanies,
    PostCompanyUpdate,
    GetUsers,
    GetDocumentTypes,
    GetProviders,
    GetSubcompaniesById,
    GetDocumentsById,
    GetDocumentsByIdentifier,
    GetUsersById,
    DeleteSubcompanyById,
    DeleteDocumentsByIdentifier,
    DeleteUserById,
}

impl Operation {
    pub const ALL: [Operation; 21] = [
        Operation::GetToken,
        Operation::GetUser,
        Operation::PostUsers,
        Operation::PostSubcompanies,
        Operation::PostDocuments,
        Operation::GetDocuments,
        Operation::GetStatus,
        Operation::GetIndex,
        Operation::GetCompany,
        Operation::GetSubcompanies,
        Operation::PostCompanyUpdate,
        Operation::GetUsers,
        Operation::GetDocumentTypes,
        Operation::GetProviders,
        Operation::GetSubcompaniesById,
        Operation::GetDocumentsById,
        Operation::GetDocumentsByIdentifier,
        Operation::GetUsersById,
        Operation::DeleteSubcompanyById,
        Operation::DeleteDocumentsByIdentifier,
        Operation::DeleteUserById,
    ];

    /// Wire name used in the descriptor catalog.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::GetToken => "getToken",
            Operation::GetUser => "getUser",
            Operation::PostUsers => "postUsers",
            Operation::PostSubcompanies => "postSubcompanies",
            Operation::PostDocuments => "postDocuments",
            Operation::GetDocuments => "getDocuments",
            Operation::GetStatus => "getStatus",
            Operation::GetIndex => "getIndex",
            Operation::GetCompany => "getCompany",
            Operation::GetSubcompanies => "getSubcompanies",
            Operation::PostCompanyUpdate => "postCompanyUpdate",
            Operation::GetUsers => "getUsers",
            Operation::GetDocumentTypes => "getDocumentTypes",
            Operation::GetProviders => "getProviders",
            Operation::GetSubcompaniesById => "getSubcompaniesById",
            Operation::GetDocumentsById => "getDocumentsById",
            Operation::GetDocumentsByIdentifier => "getDocumentsByIdentifier",
            Operation::GetUsersById => "getUsersById",
            Operation::DeleteSubcompanyById => "deleteSubcompanyById",
            Operation::DeleteDocumentsByIdentifier => "deleteDocumentsByIdentifier",
            Operation::DeleteUserById => "deleteUserById",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Operation::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| Error::UnknownOperation(s.to_string()))
    }
}

/// A capability reachable from the result of a parent operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubOperation {
    GetSimilar,
    GetRelated,
    GetRaw,
}

impl SubOperation {
    pub const ALL: [SubOperation; 3] = [
        SubOperation::GetSimilar,
        SubOperation::GetRelated,
        SubOperation::GetRaw,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubOperation::GetSimilar => "getSimilar",
            SubOperation::GetRelated => "getRelated",
            SubOperation::GetRaw => "getRaw",
        }
    }
}

impl std::fmt::Display for SubOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubOperation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        SubOperation::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| Error::UnknownOperation(s.to_string()))
    }
}
