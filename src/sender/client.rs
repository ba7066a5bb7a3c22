use crate::buffer::SDK_VERSION;
use crate::config::LoggerConfig;
use reqwest::{Client, ClientBuilder};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use url::Url;

const INGEST_PATH: &str = "/v1/ingest";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: String,
    pub api_key: String,
    pub timeout: Duration,
    pub connection_timeout: Duration,
    pub max_connections: usize,
    pub keep_alive_timeout: Duration,
    pub user_agent: String,
    pub enable_compression: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: crate::config::DEFAULT_ENDPOINT.to_string(),
            api_key: String::new(),
            timeout: crate::config::DEFAULT_REQUEST_TIMEOUT,
            connection_timeout: Duration::from_secs(5),
            max_connections: 4,
            keep_alive_timeout: Duration::from_secs(60),
            user_agent: format!("gt8004-sdk/{SDK_VERSION}"),
            enable_compression: false,
        }
    }
}

impl From<&LoggerConfig> for ClientConfig {
    fn from(config: &LoggerConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            timeout: config.request_timeout,
            connection_timeout: config.request_timeout.min(Duration::from_secs(5)),
            enable_compression: config.enable_compression,
            ..Self::default()
        }
    }
}

/// Request counters for the ingest connection.
#[derive(Debug, Default)]
pub struct ClientStats {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    total_response_time: AtomicU64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ConnectionStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub average_response_time: Duration,
}

impl ClientStats {
    pub fn record_request(&self, success: bool, response_time: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_response_time
            .fetch_add(response_time.as_millis() as u64, Ordering::Relaxed);

        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> ConnectionStats {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let total_response_time = self.total_response_time.load(Ordering::Relaxed);

        let average_response_time = if total_requests > 0 {
            Duration::from_millis(total_response_time / total_requests)
        } else {
            Duration::ZERO
        };

        ConnectionStats {
            total_requests,
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            average_response_time,
        }
    }
}

/// Pooled HTTP connection to the ingest endpoint.
#[derive(Debug, Clone)]
pub struct HttpClient {
    pub client: Client,
    pub config: ClientConfig,
    pub ingest_url: Url,
    pub stats: Arc<ClientStats>,
}

impl HttpClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let ingest_url = ingest_url(&config.endpoint)?;

        // Configure HTTP client with connection pooling
        let mut client_builder = ClientBuilder::new()
            .timeout(config.timeout)
            .connect_timeout(config.connection_timeout)
            .pool_max_idle_per_host(config.max_connections)
            .pool_idle_timeout(config.keep_alive_timeout)
            .user_agent(&config.user_agent);

        if config.enable_compression {
            client_builder = client_builder.gzip(true);
        }

        let client = client_builder.build().map_err(|e| {
            ClientError::InvalidConfiguration(format!("Failed to build HTTP client: {e}"))
        })?;

        Ok(Self {
            client,
            config,
            ingest_url,
            stats: Arc::new(ClientStats::default()),
        })
    }

    pub fn connection_stats(&self) -> ConnectionStats {
        self.stats.snapshot()
    }
}

/// Resolves the ingest URL, appending `/v1/ingest` unless the endpoint
/// already names it.
pub fn ingest_url(endpoint: &str) -> Result<Url, ClientError> {
    let endpoint_url: Url = endpoint
        .parse()
        .map_err(|e| ClientError::InvalidConfiguration(format!("Invalid endpoint URL: {e}")))?;

    if endpoint_url.path().trim_end_matches('/').ends_with(INGEST_PATH) {
        return Ok(endpoint_url);
    }

    let mut url = endpoint_url;
    let base = url.path().trim_end_matches('/').to_string();
    url.set_path(&format!("{base}{INGEST_PATH}"));
    Ok(url)
}
