//! Logger configuration.
//!
//! A [`LoggerConfig`] can be built in code, parsed from TOML, or loaded from
//! `GT8004_*` environment variables. It is validated once when the logger is
//! constructed and never changes afterwards.

pub mod serde_helpers;
mod validation;

use serde::{Deserialize, Serialize};
use serde_helpers::{duration_ms, load_bool, load_duration_ms, load_string, load_var};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_ENDPOINT: &str = "https://ingest.gt8004.xyz";
pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(5_000);
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BUFFER_CAPACITY: usize = 10_000;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CIRCUIT_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_CIRCUIT_COOLDOWN: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("File error: {0}")]
    FileError(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Environment error: {0}")]
    EnvError(String),
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Agent every entry is attributed to.
    pub agent_id: String,
    /// Bearer credential for the ingest endpoint.
    pub api_key: String,
    /// Ingest base URL; `/v1/ingest` is appended unless already present.
    pub endpoint: String,
    /// Maximum entries per batch.
    pub batch_size: usize,
    /// Maximum time an entry waits in the buffer.
    #[serde(rename = "flush_interval_ms", with = "duration_ms")]
    pub flush_interval: Duration,
    /// Delivery attempts per entry before it is dropped.
    pub max_retries: u32,
    /// Log retries, drops and deliveries.
    pub debug: bool,
    /// High-water mark of the entry buffer.
    pub buffer_capacity: usize,
    #[serde(rename = "request_timeout_ms", with = "duration_ms")]
    pub request_timeout: Duration,
    #[serde(rename = "close_timeout_ms", with = "duration_ms")]
    pub close_timeout: Duration,
    pub circuit_failure_threshold: u32,
    #[serde(rename = "circuit_cooldown_ms", with = "duration_ms")]
    pub circuit_cooldown: Duration,
    pub enable_compression: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            agent_id: String::new(),
            api_key: String::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            max_retries: DEFAULT_MAX_RETRIES,
            debug: false,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            circuit_failure_threshold: DEFAULT_CIRCUIT_FAILURE_THRESHOLD,
            circuit_cooldown: DEFAULT_CIRCUIT_COOLDOWN,
            enable_compression: false,
        }
    }
}

// Keeps the API key out of logs.
impl std::fmt::Debug for LoggerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggerConfig")
            .field("agent_id", &self.agent_id)
            .field("api_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("batch_size", &self.batch_size)
            .field("flush_interval", &self.flush_interval)
            .field("max_retries", &self.max_retries)
            .field("debug", &self.debug)
            .field("buffer_capacity", &self.buffer_capacity)
            .field("request_timeout", &self.request_timeout)
            .field("close_timeout", &self.close_timeout)
            .field("circuit_failure_threshold", &self.circuit_failure_threshold)
            .field("circuit_cooldown", &self.circuit_cooldown)
            .field("enable_compression", &self.enable_compression)
            .finish()
    }
}

impl LoggerConfig {
    pub fn new(agent_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = flush_interval;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_buffer_capacity(mut self, buffer_capacity: usize) -> Self {
        self.buffer_capacity = buffer_capacity;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn with_close_timeout(mut self, close_timeout: Duration) -> Self {
        self.close_timeout = close_timeout;
        self
    }

    pub fn with_circuit_breaker(mut self, failure_threshold: u32, cooldown: Duration) -> Self {
        self.circuit_failure_threshold = failure_threshold;
        self.circuit_cooldown = cooldown;
        self
    }

    pub fn with_compression(mut self, enable_compression: bool) -> Self {
        self.enable_compression = enable_compression;
        self
    }

    /// Loads from the process environment on top of the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().merge_env_with(|name| std::env::var(name).ok())
    }

    /// Applies `GT8004_*` variables resolved through `lookup` over `self`.
    pub fn merge_env_with<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        load_string(&lookup, "GT8004_AGENT_ID", &mut self.agent_id);
        load_string(&lookup, "GT8004_API_KEY", &mut self.api_key);
        load_string(&lookup, "GT8004_ENDPOINT", &mut self.endpoint);
        load_var(&lookup, "GT8004_BATCH_SIZE", &mut self.batch_size)?;
        load_duration_ms(&lookup, "GT8004_FLUSH_INTERVAL_MS", &mut self.flush_interval)?;
        load_var(&lookup, "GT8004_MAX_RETRIES", &mut self.max_retries)?;
        load_var(&lookup, "GT8004_BUFFER_CAPACITY", &mut self.buffer_capacity)?;
        load_duration_ms(&lookup, "GT8004_REQUEST_TIMEOUT_MS", &mut self.request_timeout)?;
        load_bool(&lookup, "GT8004_DEBUG", &mut self.debug)?;
        Ok(self)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: LoggerConfig = toml::from_str(content)?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}
