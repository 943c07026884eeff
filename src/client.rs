//! HTTP client for the relational query service.
//!
//! [`Transport`] is the one capability the decoder needs: run a transaction,
//! hand back the complete response. [`Client`] implements it over `reqwest`
//! with OAuth client-credentials auth and adds database, engine and model
//! management on top.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use reqwest::header::CONTENT_TYPE;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{Config, ProfileConfig};
use crate::error::{ClientError, ClientResult};
use crate::protocol::multipart::{is_multipart, split_parts, Part};
use crate::protocol::request::{
    self, CreateDatabaseRequest, CreateEngineRequest, CsvOptions, Database, DatabaseList, Engine,
    EngineList, Problem, RelationPayload, TransactionEnvelope, TransactionInfo,
    TransactionRequest, TransactionResponse,
};
use crate::protocol::wire::MetadataInfo;
use crate::protocol::{METADATA_PART, PROBLEMS_PART, TRANSACTION_PART};
use crate::results::ResultTable;

/// Header carrying a per-request correlation id
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Tokens are refreshed this long before they expire
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Executes transactions against the service
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Run a transaction to completion and return everything it produced
    async fn execute(&self, request: &TransactionRequest) -> ClientResult<TransactionResponse>;

    /// Run a transaction and decode every output relation
    async fn query(&self, request: &TransactionRequest) -> ClientResult<Vec<ResultTable>> {
        let response = self.execute(request).await?;
        Ok(response.tables()?)
    }
}

struct AccessToken {
    token: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    audience: String,
    grant_type: &'static str,
}

#[derive(Deserialize)]
struct DatabaseEnvelope {
    database: Database,
}

#[derive(Deserialize)]
struct EngineEnvelope {
    engine: Engine,
}

/// Authenticated HTTP client bound to one profile
pub struct Client {
    http: reqwest::Client,
    profile: ProfileConfig,
    base_url: String,
    token: Mutex<Option<AccessToken>>,
}

impl Client {
    pub fn new(profile: ProfileConfig) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(profile.request_timeout())
            .user_agent(concat!("relsdk/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let base_url = profile.base_url().trim_end_matches('/').to_string();
        Ok(Client {
            http,
            profile,
            base_url,
            token: Mutex::new(None),
        })
    }

    /// Client for the configured active profile
    pub fn from_config(config: &Config) -> ClientResult<Self> {
        Self::new(config.active_profile()?.clone())
    }

    pub fn profile(&self) -> &ProfileConfig {
        &self.profile
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ------------------------------------------------------------------------
    // Auth and plumbing
    // ------------------------------------------------------------------------

    /// Bearer token for the profile's client credentials, cached until
    /// shortly before expiry. `None` when no credentials are configured.
    async fn access_token(&self) -> ClientResult<Option<String>> {
        let Some((client_id, client_secret)) = self.profile.credentials() else {
            return Ok(None);
        };

        let cached = self
            .token
            .lock()
            .as_ref()
            .filter(|t| Instant::now() < t.expires_at)
            .map(|t| t.token.clone());
        if cached.is_some() {
            return Ok(cached);
        }

        info!(url = %self.profile.client_credentials_url, "fetching access token");
        let body = TokenRequest {
            client_id,
            client_secret,
            audience: self.profile.audience(),
            grant_type: "client_credentials",
        };
        let response = self
            .http
            .post(&self.profile.client_credentials_url)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Auth {
                reason: format!("token endpoint returned {status}: {body}"),
            });
        }
        let token: TokenResponse = serde_json::from_slice(&response.bytes().await?)
            .map_err(|e| ClientError::Auth {
                reason: format!("unreadable token response: {e}"),
            })?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *self.token.lock() = Some(AccessToken {
            token: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(Some(token.access_token))
    }

    async fn send(&self, builder: RequestBuilder) -> ClientResult<Response> {
        let mut builder = builder.header(REQUEST_ID_HEADER, Uuid::new_v4().to_string());
        if let Some(token) = self.access_token().await? {
            builder = builder.bearer_auth(token);
        }
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
        Ok(serde_json::from_slice(&response.bytes().await?)?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let response = self.send(self.http.get(self.api_url(path))).await?;
        Self::read_json(response).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let response = self
            .send(self.http.post(self.api_url(path)).json(body))
            .await?;
        Self::read_json(response).await
    }

    async fn delete(&self, path: &str) -> ClientResult<()> {
        self.send(self.http.delete(self.api_url(path))).await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Databases
    // ------------------------------------------------------------------------

    pub async fn create_database(&self, name: &str) -> ClientResult<Database> {
        info!(database = name, "creating database");
        let body = CreateDatabaseRequest {
            name: name.to_string(),
            source_name: None,
        };
        let envelope: DatabaseEnvelope = self.post_json("/databases", &body).await?;
        Ok(envelope.database)
    }

    /// Create `name` as a copy of `source`
    pub async fn clone_database(&self, name: &str, source: &str) -> ClientResult<Database> {
        info!(database = name, source, "cloning database");
        let body = CreateDatabaseRequest {
            name: name.to_string(),
            source_name: Some(source.to_string()),
        };
        let envelope: DatabaseEnvelope = self.post_json("/databases", &body).await?;
        Ok(envelope.database)
    }

    pub async fn get_database(&self, name: &str) -> ClientResult<Database> {
        let envelope: DatabaseEnvelope = self.get_json(&format!("/databases/{name}")).await?;
        Ok(envelope.database)
    }

    pub async fn list_databases(&self) -> ClientResult<Vec<Database>> {
        let list: DatabaseList = self.get_json("/databases").await?;
        Ok(list.databases)
    }

    pub async fn delete_database(&self, name: &str) -> ClientResult<()> {
        info!(database = name, "deleting database");
        self.delete(&format!("/databases/{name}")).await
    }

    // ------------------------------------------------------------------------
    // Engines
    // ------------------------------------------------------------------------

    pub async fn create_engine(&self, name: &str, size: &str) -> ClientResult<Engine> {
        info!(engine = name, size, "creating engine");
        let body = CreateEngineRequest {
            name: name.to_string(),
            size: size.to_string(),
            region: self.profile.region.clone(),
        };
        let envelope: EngineEnvelope = self.post_json("/engines", &body).await?;
        Ok(envelope.engine)
    }

    pub async fn get_engine(&self, name: &str) -> ClientResult<Engine> {
        let envelope: EngineEnvelope = self.get_json(&format!("/engines/{name}")).await?;
        Ok(envelope.engine)
    }

    pub async fn list_engines(&self) -> ClientResult<Vec<Engine>> {
        let list: EngineList = self.get_json("/engines").await?;
        Ok(list.engines)
    }

    pub async fn delete_engine(&self, name: &str) -> ClientResult<()> {
        info!(engine = name, "deleting engine");
        self.delete(&format!("/engines/{name}")).await
    }

    // ------------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------------

    pub async fn get_transaction(&self, id: &str) -> ClientResult<TransactionInfo> {
        let envelope: TransactionEnvelope =
            self.get_json(&format!("/transactions/{id}")).await?;
        Ok(envelope.transaction)
    }

    /// Poll until the transaction is terminal or the profile's poll timeout
    /// elapses
    async fn wait_for(&self, mut info: TransactionInfo) -> ClientResult<TransactionInfo> {
        let deadline = Instant::now() + Duration::from_millis(self.profile.poll_timeout_ms);
        while !info.state.is_terminal() {
            if Instant::now() >= deadline {
                return Err(ClientError::Timeout {
                    id: info.id,
                    timeout_ms: self.profile.poll_timeout_ms,
                });
            }
            tokio::time::sleep(self.profile.poll_interval()).await;
            info = self.get_transaction(&info.id).await?;
            debug!(transaction = %info.id, state = ?info.state, "polled transaction");
        }
        Ok(info)
    }

    /// Fetch metadata, problems and results of a terminal transaction
    async fn fetch_results(&self, transaction: TransactionInfo) -> ClientResult<TransactionResponse> {
        let id = &transaction.id;
        let metadata: MetadataInfo = self
            .get_json(&format!("/transactions/{id}/metadata"))
            .await?;
        let problems: Vec<Problem> = self
            .get_json(&format!("/transactions/{id}/problems"))
            .await?;

        let response = self
            .send(self.http.get(self.api_url(&format!("/transactions/{id}/results"))))
            .await?;
        let content_type = content_type(&response);
        let body = response.bytes().await?;
        let parts = split_parts(&content_type, &body)?;

        let mut full = parse_transaction_parts(parts)?;
        full.transaction = transaction;
        full.metadata = metadata.relations;
        full.problems = problems;
        Ok(full)
    }

    pub async fn install_models(
        &self,
        database: &str,
        engine: &str,
        models: &std::collections::BTreeMap<String, String>,
    ) -> ClientResult<TransactionResponse> {
        self.execute(&request::install_models(database, engine, models))
            .await
    }

    pub async fn delete_models(
        &self,
        database: &str,
        engine: &str,
        names: &[&str],
    ) -> ClientResult<TransactionResponse> {
        self.execute(&request::delete_models(database, engine, names))
            .await
    }

    /// Names of the installed models
    pub async fn list_models(&self, database: &str, engine: &str) -> ClientResult<Vec<String>> {
        let tables = self.query(&request::list_models(database, engine)).await?;
        let mut names = Vec::new();
        for table in tables.iter().map(ResultTable::physical) {
            for row in table.values()? {
                names.extend(row.iter().filter_map(|v| v.as_str().map(str::to_string)));
            }
        }
        Ok(names)
    }

    pub async fn load_json(
        &self,
        database: &str,
        engine: &str,
        relation: &str,
        data: &str,
    ) -> ClientResult<TransactionResponse> {
        self.execute(&request::load_json(database, engine, relation, data))
            .await
    }

    pub async fn load_csv(
        &self,
        database: &str,
        engine: &str,
        relation: &str,
        data: &str,
        options: &CsvOptions,
    ) -> ClientResult<TransactionResponse> {
        self.execute(&request::load_csv(database, engine, relation, data, options))
            .await
    }
}

impl Transport for Client {
    /// Submit with `POST /transactions`. A multipart answer is the complete
    /// result; a JSON answer names a transaction still running, which is
    /// polled and then fetched piecewise.
    async fn execute(&self, request: &TransactionRequest) -> ClientResult<TransactionResponse> {
        info!(
            database = %request.database,
            engine = %request.engine,
            readonly = request.readonly,
            "executing transaction"
        );
        let response = self
            .send(self.http.post(self.api_url("/transactions")).json(request))
            .await?;
        let content_type = content_type(&response);
        let body = response.bytes().await?;

        if is_multipart(&content_type) {
            let response = parse_transaction_parts(split_parts(&content_type, &body)?)?;
            debug!(
                transaction = %response.transaction.id,
                relations = response.results.len(),
                "transaction completed synchronously"
            );
            return Ok(response);
        }

        let envelope: TransactionEnvelope = serde_json::from_slice(&body)?;
        let transaction = self.wait_for(envelope.transaction).await?;
        self.fetch_results(transaction).await
    }
}

fn content_type(response: &Response) -> String {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Assemble a response from multipart parts: the JSON `transaction`,
/// `metadata` and `problems` parts, every other part a relation payload
pub fn parse_transaction_parts(parts: Vec<Part>) -> ClientResult<TransactionResponse> {
    let mut response = TransactionResponse::default();
    for part in parts {
        match part.name.as_str() {
            TRANSACTION_PART => {
                let value: serde_json::Value = serde_json::from_slice(&part.body)?;
                // bare or wrapped in {"transaction": ...}
                let value = match value {
                    serde_json::Value::Object(mut map) if map.contains_key(TRANSACTION_PART) => {
                        map.remove(TRANSACTION_PART).unwrap_or_default()
                    }
                    other => other,
                };
                response.transaction = serde_json::from_value(value)?;
            }
            METADATA_PART => {
                let metadata: MetadataInfo = serde_json::from_slice(&part.body)?;
                response.metadata = metadata.relations;
            }
            PROBLEMS_PART => response.problems = serde_json::from_slice(&part.body)?,
            _ => response.results.push(RelationPayload {
                relation_id: part.name,
                data: part.body,
            }),
        }
    }
    if response.transaction.id.is_empty() {
        return Err(ClientError::invalid_response(
            "multipart response has no transaction part",
        ));
    }
    Ok(response)
}
