//! Error Types
//!
//! `DecodeError` covers everything between a wire relation descriptor and a
//! native value. `ClientError` wraps it together with transport failures.

use thiserror::Error;

/// Errors raised while normalizing type descriptors or converting values
#[derive(Error, Debug)]
pub enum DecodeError {
    /// A primitive value carried a tag outside the closed wire set
    #[error("Unsupported primitive value kind: {tag}")]
    UnsupportedPrimitiveKind { tag: String },

    /// A type descriptor named a primitive type outside the closed wire set
    #[error("Unsupported primitive type: {tag}")]
    UnsupportedPrimitiveType { tag: String },

    /// The converter has no rule for this type
    #[error("Unhandled value type: {type_name}")]
    UnhandledValueType { type_name: String },

    /// The raw value does not have the shape the type expects
    #[error("Malformed {type_name} value: {reason}")]
    MalformedCompositeValue { type_name: String, reason: String },

    /// A type descriptor is missing the payload its tag requires
    #[error("Malformed type descriptor: {reason}")]
    MalformedDescriptor { reason: String },

    /// A relation-id path string could not be parsed
    #[error("Invalid relation path '{path}': {reason}")]
    InvalidRelationPath { path: String, reason: String },

    /// Row index past the end of the table
    #[error("Row {row} out of range (table has {rows} rows)")]
    RowOutOfRange { row: usize, rows: usize },

    /// Column index past the end of the table
    #[error("Column {column} out of range (table has {columns} columns)")]
    ColumnOutOfRange { column: usize, columns: usize },

    /// Slice bounds are reversed or past the end of the table
    #[error("Invalid slice {begin}..{end} (table has {rows} rows)")]
    InvalidSlice { begin: usize, end: usize, rows: usize },

    /// Metadata names a relation the payload does not carry, or vice versa
    #[error("Relation not found in response: {relation_id}")]
    MissingRelation { relation_id: String },

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DecodeError {
    pub(crate) fn malformed(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        DecodeError::MalformedCompositeValue {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for decoding operations
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Errors raised by the HTTP client
#[derive(Error, Debug)]
pub enum ClientError {
    /// Transport-level HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status
    #[error("Request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    /// Access token could not be obtained
    #[error("Authentication failed: {reason}")]
    Auth { reason: String },

    /// The response body did not have the expected shape
    #[error("Invalid response: {reason}")]
    InvalidResponse { reason: String },

    /// The transaction did not reach a terminal state in time
    #[error("Transaction {id} did not complete within {timeout_ms}ms")]
    Timeout { id: String, timeout_ms: u64 },

    /// Result decoding error
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    /// The selected profile is not configured
    #[error("Unknown profile: {profile}")]
    UnknownProfile { profile: String },
}

impl ClientError {
    pub(crate) fn invalid_response(reason: impl Into<String>) -> Self {
        ClientError::InvalidResponse {
            reason: reason.into(),
        }
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
