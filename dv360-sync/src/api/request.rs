//! Request descriptions handed to the HTTP transport

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single REST call, relative to the API version root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ApiRequest {
    /// Read an entity or a page of a collection
    Get { uri: String },
    /// Create an entity or invoke a custom method (`:bulkEdit...`)
    Post { uri: String, body: Value },
    /// Partial update; the URI carries the `updateMask`
    Patch { uri: String, body: Value },
    /// Delete an entity
    Delete { uri: String },
}

impl ApiRequest {
    pub fn get(uri: impl Into<String>) -> Self {
        Self::Get { uri: uri.into() }
    }

    pub fn post(uri: impl Into<String>, body: Value) -> Self {
        Self::Post {
            uri: uri.into(),
            body,
        }
    }

    pub fn patch(uri: impl Into<String>, body: Value) -> Self {
        Self::Patch {
            uri: uri.into(),
            body,
        }
    }

    pub fn delete(uri: impl Into<String>) -> Self {
        Self::Delete { uri: uri.into() }
    }

    pub fn uri(&self) -> &str {
        match self {
            Self::Get { uri } | Self::Post { uri, .. } | Self::Patch { uri, .. } | Self::Delete { uri } => uri,
        }
    }

    pub fn body(&self) -> Option<&Value> {
        match self {
            Self::Post { body, .. } | Self::Patch { body, .. } => Some(body),
            Self::Get { .. } | Self::Delete { .. } => None,
        }
    }

    /// Get the HTTP method for this request
    pub fn http_method(&self) -> &'static str {
        match self {
            Self::Get { .. } => "GET",
            Self::Post { .. } => "POST",
            Self::Patch { .. } => "PATCH",
            Self::Delete { .. } => "DELETE",
        }
    }

    /// Get the operation type as a string
    pub fn operation_type(&self) -> &'static str {
        match self {
            Self::Get { .. } => "read",
            Self::Post { .. } => "create",
            Self::Patch { .. } => "update",
            Self::Delete { .. } => "delete",
        }
    }

    /// Whether the request changes server state
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::Get { .. })
    }
}

impl std::fmt::Display for ApiRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.http_method(), self.uri())
    }
}
