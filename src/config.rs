// src/config.rs
//! Service configuration.
//!
//! Layered with the `config` crate, lowest priority first:
//! 1. Built-in defaults
//! 2. `credential-authority.toml` in the working directory, or the file
//!    named by `CREDENTIAL_AUTHORITY_CONFIG` (optional)
//! 3. Environment variables such as `CREDENTIAL_AUTHORITY__AUTHORITY__ADMIN`
//!
//! `.env` is loaded by `main` before this runs, so its values arrive through
//! the environment layer.

use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

const ENV_PREFIX: &str = "CREDENTIAL_AUTHORITY";
const DEFAULT_CONFIG_FILE: &str = "credential-authority";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub authority: AuthoritySettings,
    pub ledger: LedgerSettings,
    pub audit: AuditSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthoritySettings {
    /// Root administrator identity; always authorized to issue and revoke.
    pub admin: String,
    /// Prefix joined with a document hash to form a token URI.
    pub document_gateway: String,
}

/// What a definitive "no such token" answer from the ledger means.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotFoundPolicy {
    /// Serve the read from the local store anyway.
    #[default]
    Fallback,
    /// The ledger answer is final.
    Authoritative,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerSettings {
    #[serde(default)]
    pub rpc_url: Option<String>,
    #[serde(default)]
    pub contract_address: Option<String>,
    pub timeout_ms: u64,
    #[serde(default)]
    pub not_found_policy: NotFoundPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditSettings {
    pub capacity: usize,
}

impl Settings {
    /// Loads settings from the default file (if present) and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::env::var(format!("{}_CONFIG", ENV_PREFIX))
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::defaults()?
            .add_source(File::with_name(&file).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Loads settings from inline TOML layered over the defaults.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        Self::defaults()?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("database.path", "credentials.db")?
            .set_default("authority.document_gateway", "https://ipfs.io/ipfs/")?
            .set_default("ledger.timeout_ms", 5000)?
            .set_default("ledger.not_found_policy", "fallback")?
            .set_default("audit.capacity", 1024)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.server.host, self.server.port).parse()
    }

    pub fn ledger_timeout(&self) -> Duration {
        Duration::from_millis(self.ledger.timeout_ms)
    }
}
