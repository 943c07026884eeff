//! Service Protocol
//!
//! Everything that crosses the wire: relation type descriptors, the
//! path form of relation ids, multipart result bodies, and REST payloads.
//!
//! # Module Structure
//!
//! - `wire` - relation-type descriptors and primitive literals (`WireRelType`, `PrimitiveValue`, ...)
//! - `path` - relation-id path strings to `WireRelationId`
//! - `multipart` - splitting `multipart/form-data` result bodies
//! - `request` - database, engine and transaction payloads

pub mod multipart;
pub mod path;
pub mod request;
pub mod wire;

pub use path::parse_relation_path;
pub use request::{
    CreateDatabaseRequest, CreateEngineRequest, QueryInput, RelationPayload, TransactionInfo,
    TransactionRequest, TransactionResponse, TransactionState,
};
pub use wire::{
    PrimitiveType, PrimitiveValue, RelKind, RelationMetadata, WireRelType, WireRelationId,
};

/// Default HTTPS port of the service
pub const DEFAULT_PORT: u16 = 443;

/// Default request timeout in milliseconds
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Multipart part carrying the transaction document
pub const TRANSACTION_PART: &str = "transaction";

/// Multipart part carrying relation metadata
pub const METADATA_PART: &str = "metadata";

/// Multipart part carrying problems
pub const PROBLEMS_PART: &str = "problems";
