//! Request and response payloads of the service's REST API.
//!
//! Database and engine management are plain JSON. Transactions carry Rel
//! source plus named inputs; model installs and data loads are built here as
//! ordinary transactions.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use super::wire::RelationMetadata;

// ============================================================================
// Databases and engines
// ============================================================================

/// Body of `POST /databases`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateDatabaseRequest {
    pub name: String,
    /// Clone from this database when set
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Database {
    pub name: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DatabaseList {
    #[serde(default)]
    pub databases: Vec<Database>,
}

/// Body of `POST /engines`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateEngineRequest {
    pub name: String,
    #[serde(default = "default_engine_size")]
    pub size: String,
    #[serde(default)]
    pub region: String,
}

fn default_engine_size() -> String {
    "XS".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Engine {
    pub name: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineList {
    #[serde(default)]
    pub engines: Vec<Engine>,
}

// ============================================================================
// Transactions
// ============================================================================

/// A named input visible to the query as a relation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryInput {
    pub name: String,
    pub value: String,
}

/// Body of `POST /transactions`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionRequest {
    #[serde(rename = "dbname")]
    pub database: String,
    #[serde(rename = "engine_name")]
    pub engine: String,
    pub query: String,
    pub readonly: bool,
    #[serde(rename = "v1_inputs", default)]
    pub inputs: Vec<QueryInput>,
}

impl TransactionRequest {
    pub fn new(database: &str, engine: &str, query: impl Into<String>, readonly: bool) -> Self {
        TransactionRequest {
            database: database.to_string(),
            engine: engine.to_string(),
            query: query.into(),
            readonly,
            inputs: Vec::new(),
        }
    }

    pub fn with_input(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.inputs.push(QueryInput {
            name: name.into(),
            value: value.into(),
        });
        self
    }
}

/// Lifecycle of a transaction on the service
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionState {
    #[default]
    Created,
    Running,
    Completed,
    Aborted,
    #[serde(other)]
    Unknown,
}

impl TransactionState {
    /// Results can be fetched once the transaction is terminal
    pub fn is_terminal(self) -> bool {
        matches!(self, TransactionState::Completed | TransactionState::Aborted)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TransactionInfo {
    pub id: String,
    #[serde(default)]
    pub state: TransactionState,
}

/// JSON wrapper the service uses for transaction lookups
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TransactionEnvelope {
    pub transaction: TransactionInfo,
}

/// A diagnostic reported by the query compiler or runtime
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Problem {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub error_code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub report: String,
    #[serde(default)]
    pub is_error: bool,
}

/// One relation's columnar payload, keyed by its relation-id path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationPayload {
    pub relation_id: String,
    /// Arrow IPC stream
    pub data: Vec<u8>,
}

/// Everything a completed transaction returns
#[derive(Debug, Clone, Default)]
pub struct TransactionResponse {
    pub transaction: TransactionInfo,
    pub metadata: Vec<RelationMetadata>,
    pub problems: Vec<Problem>,
    pub results: Vec<RelationPayload>,
}

impl TransactionResponse {
    pub fn has_errors(&self) -> bool {
        self.problems.iter().any(|p| p.is_error)
    }
}

// ============================================================================
// Model and data-load builders
// ============================================================================

/// Install (or replace) models from `name -> source`
pub fn install_models(
    database: &str,
    engine: &str,
    models: &BTreeMap<String, String>,
) -> TransactionRequest {
    let mut query = String::new();
    let mut request = TransactionRequest::new(database, engine, "", false);
    for (i, (name, source)) in models.iter().enumerate() {
        let input = format!("__model_{i}");
        let name = escape(name);
        let _ = writeln!(
            query,
            "def delete:rel:catalog:model[\"{name}\"] = rel:catalog:model[\"{name}\"]"
        );
        let _ = writeln!(query, "def insert:rel:catalog:model[\"{name}\"] = {input}");
        request = request.with_input(input, source.clone());
    }
    request.query = query;
    request
}

pub fn delete_models(database: &str, engine: &str, names: &[&str]) -> TransactionRequest {
    let query = names
        .iter()
        .map(|name| {
            let name = escape(name);
            format!("def delete:rel:catalog:model[\"{name}\"] = rel:catalog:model[\"{name}\"]\n")
        })
        .collect::<String>();
    TransactionRequest::new(database, engine, query, false)
}

pub fn list_models(database: &str, engine: &str) -> TransactionRequest {
    TransactionRequest::new(
        database,
        engine,
        "def output(name) = rel:catalog:model(name, _)",
        true,
    )
}

/// Load a JSON document into `relation`
pub fn load_json(database: &str, engine: &str, relation: &str, data: &str) -> TransactionRequest {
    let query = format!(
        "def config:data = data\ndef insert:{relation} = load_json[config]"
    );
    TransactionRequest::new(database, engine, query, false).with_input("data", data)
}

/// CSV syntax and schema options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvOptions {
    pub header_row: Option<i64>,
    pub delim: Option<char>,
    pub escapechar: Option<char>,
    pub quotechar: Option<char>,
    /// Column name to Rel type name
    pub schema: BTreeMap<String, String>,
}

/// Load CSV text into `relation`
pub fn load_csv(
    database: &str,
    engine: &str,
    relation: &str,
    data: &str,
    options: &CsvOptions,
) -> TransactionRequest {
    let mut query = String::from("def config:data = data\n");
    if let Some(row) = options.header_row {
        let _ = writeln!(query, "def config:syntax:header_row = {row}");
    }
    for (key, c) in [
        ("delim", options.delim),
        ("escapechar", options.escapechar),
        ("quotechar", options.quotechar),
    ] {
        if let Some(c) = c {
            let _ = writeln!(query, "def config:syntax:{key} = '{}'", char_literal(c));
        }
    }
    for (column, ty) in &options.schema {
        let _ = writeln!(query, "def config:schema:{column} = \"{}\"", escape(ty));
    }
    let _ = write!(query, "def insert:{relation} = load_csv[config]");
    TransactionRequest::new(database, engine, query, false).with_input("data", data)
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn char_literal(c: char) -> String {
    match c {
        '\'' => "\\'".to_string(),
        '\\' => "\\\\".to_string(),
        c => c.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_request_wire_names() {
        let req = TransactionRequest::new("db", "eng", "def output = 1", true).with_input("x", "1");
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["dbname"], "db");
        assert_eq!(json["engine_name"], "eng");
        assert_eq!(json["readonly"], true);
        assert_eq!(json["v1_inputs"][0]["name"], "x");
    }

    #[test]
    fn test_transaction_state() {
        let info: TransactionInfo =
            serde_json::from_str(r#"{"id":"t1","state":"COMPLETED"}"#).unwrap();
        assert!(info.state.is_terminal());
        let info: TransactionInfo = serde_json::from_str(r#"{"id":"t1","state":"QUEUED"}"#).unwrap();
        assert_eq!(info.state, TransactionState::Unknown);
        assert!(!info.state.is_terminal());
    }

    #[test]
    fn test_install_models_uses_named_inputs() {
        let mut models = BTreeMap::new();
        models.insert("a/b".to_string(), "def x = 1".to_string());
        models.insert("c".to_string(), "def y = 2".to_string());
        let req = install_models("db", "eng", &models);
        assert!(!req.readonly);
        assert_eq!(req.inputs.len(), 2);
        assert_eq!(req.inputs[0].name, "__model_0");
        assert_eq!(req.inputs[0].value, "def x = 1");
        assert!(req
            .query
            .contains("def insert:rel:catalog:model[\"a/b\"] = __model_0"));
        assert!(req.query.contains("def delete:rel:catalog:model[\"c\"]"));
    }

    #[test]
    fn test_load_csv_options() {
        let mut options = CsvOptions {
            header_row: Some(1),
            delim: Some('|'),
            quotechar: Some('\''),
            ..Default::default()
        };
        options.schema.insert("age".to_string(), "int".to_string());
        let req = load_csv("db", "eng", "people", "a|b\n1|2", &options);
        assert!(req.query.contains("def config:syntax:header_row = 1"));
        assert!(req.query.contains("def config:syntax:delim = '|'"));
        assert!(req.query.contains("def config:syntax:quotechar = '\\''"));
        assert!(req.query.contains("def config:schema:age = \"int\""));
        assert!(req.query.ends_with("def insert:people = load_csv[config]"));
        assert_eq!(req.inputs[0].value, "a|b\n1|2");
    }

    #[test]
    fn test_load_json() {
        let req = load_json("db", "eng", "doc", r#"{"a":1}"#);
        assert!(req.query.contains("load_json[config]"));
        assert_eq!(req.inputs[0].name, "data");
    }
}
