//! Connection configuration for the source platform and the destination CMDB.
//!
//! All values come from environment variables. Missing credentials are a
//! fatal error raised before any collection begins; nothing in the sync run
//! is allowed to start against a half-configured pair of endpoints.

use thiserror::Error;

/// Default per-request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Connection settings for the source automation platform (Basic auth).
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Base URL, e.g. `https://automation.example.com`.
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Whether to verify the TLS certificate of the endpoint.
    pub verify_tls: bool,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

/// Connection settings for the destination CMDB (token auth).
#[derive(Debug, Clone)]
pub struct CmdbConfig {
    /// Base URL, e.g. `https://cmdb.example.com`.
    pub base_url: String,
    pub token: String,
    pub verify_tls: bool,
    pub timeout_secs: u64,
}

/// Full configuration for one sync run.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub source: SourceConfig,
    pub cmdb: CmdbConfig,
}

impl SyncConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    /// Load configuration from a custom variable reader.
    ///
    /// This allows tests to supply variables without mutating process-global
    /// environment state.
    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let source_url =
            reader("SOURCE_URL").map_err(|_| ConfigError::MissingVar("SOURCE_URL".into()))?;

        // Both spellings are accepted; deployments predating the rename still
        // inject the short form.
        let source_username = reader("SOURCE_USERNAME")
            .or_else(|_| reader("SOURCE_USER"))
            .map_err(|_| ConfigError::MissingVar("SOURCE_USERNAME".into()))?;

        let source_password = reader("SOURCE_PASSWORD")
            .map_err(|_| ConfigError::MissingVar("SOURCE_PASSWORD".into()))?;

        let cmdb_url = reader("CMDB_URL")
            .or_else(|_| reader("CMDB_API"))
            .map_err(|_| ConfigError::MissingVar("CMDB_URL".into()))?;

        let cmdb_token =
            reader("CMDB_TOKEN").map_err(|_| ConfigError::MissingVar("CMDB_TOKEN".into()))?;

        let source_verify_tls = parse_bool(&reader, "SOURCE_VERIFY_TLS", true);
        let cmdb_verify_tls = parse_bool(&reader, "CMDB_VERIFY_TLS", true);

        let source_timeout_secs = parse_secs(&reader, "SOURCE_TIMEOUT_SECS")?;
        let cmdb_timeout_secs = parse_secs(&reader, "CMDB_TIMEOUT_SECS")?;

        Ok(Self {
            source: SourceConfig {
                base_url: source_url,
                username: source_username,
                password: source_password,
                verify_tls: source_verify_tls,
                timeout_secs: source_timeout_secs,
            },
            cmdb: CmdbConfig {
                base_url: cmdb_url,
                token: cmdb_token,
                verify_tls: cmdb_verify_tls,
                timeout_secs: cmdb_timeout_secs,
            },
        })
    }
}

fn parse_bool<F>(reader: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    reader(key)
        .unwrap_or_else(|_| default.to_string())
        .parse::<bool>()
        .unwrap_or(default)
}

fn parse_secs<F>(reader: &F, key: &str) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    reader(key)
        .unwrap_or_else(|_| DEFAULT_TIMEOUT_SECS.to_string())
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidValue(key.into(), e.to_string()))
}
