//! Error types for the catalog API client.
//!
//! # Design
//! Three outcome classes reach callers: `Validation` (field-level problems
//! the UI maps onto form fields), `NotFound` (rendered as a placeholder
//! state) and `Transport` (everything else, shown as a generic failure).
//! All of them are `Clone` because failed reads are stored in query cache
//! snapshots and handed to every subscriber.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Errors returned by `CatalogClient` and everything layered on top of it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    /// The request was rejected with field-level details, either by the
    /// server (4xx error envelope) or locally before it was sent.
    #[error("validation failed: {0}")]
    Validation(ValidationError),

    /// The server returned 404.
    #[error("resource not found")]
    NotFound,

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The cache entry was discarded before its fetch settled.
    #[error("query cancelled")]
    Cancelled,
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound)
    }

    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            ApiError::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Validation(err)
    }
}

/// Failures that are not attributable to user input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// No response was received.
    #[error("network error: {0}")]
    Network(String),

    /// A non-2xx status without a usable validation envelope.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// A success status whose body is not the expected JSON.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("invalid request URL: {0}")]
    InvalidUrl(String),
}

/// Error envelope sent by the backend on non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: String,
    #[serde(default)]
    pub details: Option<Vec<FieldIssue>>,
}

/// A structured validation failure: a summary message plus per-field issues.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
    pub details: Vec<FieldIssue>,
}

impl ValidationError {
    /// A single-field failure raised on the client side.
    pub fn field(field: &str, code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            message: "Validation failed".to_string(),
            details: vec![FieldIssue {
                code: code.to_string(),
                expected: None,
                received: None,
                path: vec![PathSegment::Key(field.to_string())],
                message,
            }],
        }
    }

    /// Map issues onto form fields, keyed by the first path segment.
    ///
    /// Issues without a path are left out; a later issue for the same field
    /// replaces an earlier one.
    pub fn field_errors(&self) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();
        for issue in &self.details {
            if let Some(field) = issue.field() {
                fields.insert(field, issue.message.clone());
            }
        }
        fields
    }
}

impl From<ErrorEnvelope> for ValidationError {
    fn from(envelope: ErrorEnvelope) -> Self {
        Self {
            message: envelope.error,
            details: envelope.details.unwrap_or_default(),
        }
    }
}

/// One entry of the envelope's `details` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received: Option<String>,
    #[serde(default)]
    pub path: Vec<PathSegment>,
    pub message: String,
}

impl FieldIssue {
    /// The form field this issue belongs to.
    pub fn field(&self) -> Option<String> {
        self.path.first().map(ToString::to_string)
    }
}

/// Element of an issue path: an object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(u64),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => f.write_str(key),
            PathSegment::Index(index) => write!(f, "{index}"),
        }
    }
}
