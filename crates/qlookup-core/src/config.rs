//! Configuration loading and the lookup option surface.
//!
//! Uses Figment to merge built-in defaults, `config.toml`, `config.<env>.toml`
//! and `APP_*` env vars (`APP_LOOKUP__QUERY` sets `lookup.query`).

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new()
            .merge(Serialized::defaults(LookupOptions::default()).key("lookup"))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment })
    }

    pub fn from_figment(figment: Figment) -> Self { Self { figment } }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Extracts and validates the `[lookup]` table.
    pub fn lookup_options(&self) -> anyhow::Result<LookupOptions> {
        let options: LookupOptions = self.get("lookup")?;
        options.validate()?;
        Ok(options)
    }
}

/// Everything a lookup invocation reads from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupOptions {
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub workgroup: String,
    pub output_location: Option<String>,
    pub query: String,
    pub row_limit: usize,
    pub title_attributes: Option<String>,
    pub detail_attributes: Option<String>,
    pub summary_attributes: Option<String>,
    pub max_summary_documents: usize,
    pub poll_attempts: u32,
    pub poll_interval_ms: u64,
    pub max_concurrency: usize,
    pub statement_scope: String,
}

impl Default for LookupOptions {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            workgroup: "primary".to_string(),
            output_location: None,
            query: String::new(),
            row_limit: 100,
            title_attributes: None,
            detail_attributes: None,
            summary_attributes: None,
            max_summary_documents: 3,
            poll_attempts: 10,
            poll_interval_ms: 3000,
            max_concurrency: 10,
            statement_scope: "qlookup".to_string(),
        }
    }
}

/// Static credentials. When absent the service client falls back to
/// ambient infrastructure credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// The subset of options that requires a new service client when it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    pub region: String,
    pub endpoint: Option<String>,
    pub credentials: Option<Credentials>,
}

impl LookupOptions {
    pub fn validate(&self) -> Result<()> {
        if self.query.trim().is_empty() { return Err(Error::InvalidConfig("query must not be empty".into())); }
        if self.region.trim().is_empty() { return Err(Error::InvalidConfig("region must not be empty".into())); }
        if self.row_limit == 0 { return Err(Error::InvalidConfig("row_limit must be greater than zero".into())); }
        if self.poll_attempts == 0 { return Err(Error::InvalidConfig("poll_attempts must be greater than zero".into())); }
        if self.max_concurrency == 0 { return Err(Error::InvalidConfig("max_concurrency must be greater than zero".into())); }
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(_), None) | (None, Some(_)) => {
                Err(Error::InvalidConfig("access_key_id and secret_access_key must be provided together".into()))
            }
            _ => Ok(()),
        }
    }

    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
                Some(Credentials { access_key_id: id.clone(), secret_access_key: secret.clone() })
            }
            _ => None,
        }
    }

    pub fn connection(&self) -> ConnectionSettings {
        ConnectionSettings { region: self.region.clone(), endpoint: self.endpoint.clone(), credentials: self.credentials() }
    }

    pub fn poll_interval(&self) -> Duration { Duration::from_millis(self.poll_interval_ms) }

    /// Output location with blank strings treated as unset.
    pub fn output_location(&self) -> Option<&str> {
        self.output_location.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}
