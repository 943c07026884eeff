//! Configuration System
//!
//! Provides hierarchical configuration loading from:
//! - relsdk.toml (default configuration)
//! - relsdk.local.toml (git-ignored local overrides)
//! - Environment variables (RELSDK_* prefix)
//!
//! ## Example
//!
//! ```toml
//! # relsdk.toml
//! profile = "prod"
//!
//! [profiles.prod]
//! host = "azure.relationalai.com"
//! client_id = "my-client"
//! client_secret = "..."
//!
//! [logging]
//! level = "debug"
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! RELSDK_PROFILE=staging
//! RELSDK_PROFILES__STAGING__CLIENT_SECRET=...
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Name of the profile to connect with
    #[serde(default = "default_profile")]
    pub profile: String,

    #[serde(default = "default_profiles")]
    pub profiles: BTreeMap<String, ProfileConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection settings for one service account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// `https` or `http`
    #[serde(default = "default_scheme")]
    pub scheme: String,

    #[serde(default = "default_region")]
    pub region: String,

    /// OAuth client credentials. Requests go out unauthenticated when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Token endpoint for the client-credentials grant
    #[serde(default = "default_client_credentials_url")]
    pub client_credentials_url: String,

    /// Token audience; derived from the host when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,

    /// Per-request HTTP timeout
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Delay between transaction status polls
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Give up waiting on a transaction after this long
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_profile() -> String {
    "default".to_string()
}
fn default_profiles() -> BTreeMap<String, ProfileConfig> {
    BTreeMap::from([(default_profile(), ProfileConfig::default())])
}
fn default_host() -> String {
    "azure.relationalai.com".to_string()
}
fn default_port() -> u16 {
    crate::protocol::DEFAULT_PORT
}
fn default_scheme() -> String {
    "https".to_string()
}
fn default_region() -> String {
    "us-east".to_string()
}
fn default_client_credentials_url() -> String {
    "https://login.relationalai.com/oauth/token".to_string()
}
fn default_request_timeout_ms() -> u64 {
    crate::protocol::DEFAULT_REQUEST_TIMEOUT_MS
}
fn default_poll_interval_ms() -> u64 {
    500
}
fn default_poll_timeout_ms() -> u64 {
    600_000 // 10 minutes
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Merges in order:
    /// 1. relsdk.toml (base configuration)
    /// 2. relsdk.local.toml (local overrides, git-ignored)
    /// 3. Environment variables (RELSDK_* prefix)
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("relsdk.toml"))
            .merge(Toml::file("relsdk.local.toml"))
            .merge(env())
            .extract()
    }

    /// Load configuration from specific file path
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(env())
            .extract()
    }

    /// The profile named by `profile`
    pub fn active_profile(&self) -> ClientResult<&ProfileConfig> {
        self.profiles
            .get(&self.profile)
            .ok_or_else(|| ClientError::UnknownProfile {
                profile: self.profile.clone(),
            })
    }
}

fn env() -> Env {
    // RELSDK_LOG is the log filter override, not a config key
    Env::prefixed("RELSDK_").ignore(&["LOG"]).split("__")
}

impl Default for Config {
    fn default() -> Self {
        Config {
            profile: default_profile(),
            profiles: default_profiles(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ProfileConfig {
    /// `scheme://host:port`
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }

    pub fn audience(&self) -> String {
        self.audience
            .clone()
            .unwrap_or_else(|| format!("https://{}", self.host))
    }

    /// Both halves of the client credentials, when configured
    pub fn credentials(&self) -> Option<(&str, &str)> {
        Some((self.client_id.as_deref()?, self.client_secret.as_deref()?))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for ProfileConfig {
    fn default() -> Self {
        ProfileConfig {
            host: default_host(),
            port: default_port(),
            scheme: default_scheme(),
            region: default_region(),
            client_id: None,
            client_secret: None,
            client_credentials_url: default_client_credentials_url(),
            audience: None,
            request_timeout_ms: default_request_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            poll_timeout_ms: default_poll_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}
