//! # relsdk
//!
//! Client library for a remote relational query service: database and
//! engine management, transactions, and decoding of typed results.
//!
//! ## Decoding Pipeline
//!
//! ```text
//! Relation metadata (JSON or relation-id path)
//!     ↓
//! [protocol::wire / protocol::path]  → WireRelationId
//!     ↓
//! [typedef::normalize]               → TypeDef per column (value types folded,
//!     ↓                                 constants evaluated)
//! [decode::column_defs]              → ColumnDef (physical index or constant)
//!     ↓
//! Arrow IPC payload ──[value::arrow_convert]→ RawValue per cell
//!     ↓
//! [convert::convert_value]           → Value
//!     ↓
//! [results::ResultTable]             → rows, columns, slices, physical projection
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relsdk::{Client, Config, Transport, TransactionRequest};
//!
//! let config = Config::load()?;
//! relsdk::logging::init(&config.logging);
//! let client = Client::from_config(&config)?;
//!
//! let request = TransactionRequest::new("db", "engine", "def output = 1, \"a\"", true);
//! for table in client.query(&request).await? {
//!     println!("{}", table.relation_id());
//!     for row in table.values()? {
//!         println!("  {row:?}");
//!     }
//! }
//! ```

pub mod client;
pub mod config;
pub mod convert;
pub mod decode;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod results;
pub mod typedef;
pub mod value;

pub use client::{Client, Transport};
pub use config::{Config, LoggingConfig, ProfileConfig};
pub use convert::convert_value;
pub use decode::{decode_ipc, decode_relation, decode_response};
pub use error::{ClientError, ClientResult, DecodeError, DecodeResult};
pub use protocol::{
    parse_relation_path, TransactionRequest, TransactionResponse, WireRelType, WireRelationId,
};
pub use results::{ColumnDef, ResultColumn, ResultTable};
pub use typedef::{normalize, ScalarType, TypeDef};
pub use value::{map_primitive_value, Rational, RawValue, Value};
