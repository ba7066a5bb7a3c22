//! Read-only client for the GT8004 platform API.

use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

pub const DEFAULT_API_ENDPOINT: &str = "https://api.gt8004.network";
pub const DEFAULT_PERFORMANCE_WINDOW: &str = "24h";
pub const DEFAULT_LOG_LIMIT: u32 = 50;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid API endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error: HTTP {status} - {body}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Reputation,
    Requests,
    Revenue,
    ResponseTime,
    Newest,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reputation => "reputation",
            Self::Requests => "requests",
            Self::Revenue => "revenue",
            Self::ResponseTime => "response_time",
            Self::Newest => "newest",
        }
    }
}

/// Marketplace search filters. Unset fields are left out of the query.
#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    pub category: Option<String>,
    pub protocol: Option<String>,
    pub min_reputation: Option<f64>,
    pub sort: Option<SortOrder>,
}

impl SearchParams {
    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(category) = &self.category {
            query.push(("category", category.clone()));
        }
        if let Some(protocol) = &self.protocol {
            query.push(("protocol", protocol.clone()));
        }
        if let Some(min) = self.min_reputation.filter(|min| *min > 0.0) {
            query.push(("min_reputation", min.to_string()));
        }
        if let Some(sort) = self.sort {
            query.push(("sort", sort.as_str().to_string()));
        }
        query
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentInfo {
    pub id: String,
    pub agent_id: String,
    pub name: String,
    pub category: String,
    pub protocols: Vec<String>,
    pub status: String,
    pub total_requests: u64,
    pub avg_response_ms: f64,
    pub reputation_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchResult {
    pub agents: Vec<AgentInfo>,
    pub total: u64,
}

#[derive(Debug, Clone)]
pub struct PlatformClient {
    client: Client,
    base: Url,
}

impl PlatformClient {
    pub fn new(api_key: &str) -> Result<Self, ApiError> {
        Self::with_endpoint(DEFAULT_API_ENDPOINT, api_key)
    }

    pub fn with_endpoint(endpoint: &str, api_key: &str) -> Result<Self, ApiError> {
        let base: Url = endpoint
            .trim_end_matches('/')
            .parse()
            .map_err(|e| ApiError::InvalidEndpoint(format!("{endpoint}: {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if !api_key.is_empty() {
            let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|e| ApiError::InvalidEndpoint(format!("invalid api key: {e}")))?;
            auth.set_sensitive(true);
            headers.insert(AUTHORIZATION, auth);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("gt8004-sdk/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, base })
    }

    pub fn endpoint(&self) -> &Url {
        &self.base
    }

    pub async fn search_agents(&self, params: &SearchParams) -> Result<SearchResult, ApiError> {
        self.get("/v1/agents/search", &params.query()).await
    }

    pub async fn agent_stats(&self, agent_id: &str) -> Result<serde_json::Value, ApiError> {
        self.get(&format!("/v1/agents/{agent_id}/stats"), &[]).await
    }

    /// Performance report; `window` defaults to `24h`.
    pub async fn performance(
        &self,
        agent_id: &str,
        window: Option<&str>,
    ) -> Result<serde_json::Value, ApiError> {
        let window = window.unwrap_or(DEFAULT_PERFORMANCE_WINDOW).to_string();
        self.get(
            &format!("/v1/agents/{agent_id}/performance"),
            &[("window", window)],
        )
        .await
    }

    /// Recent request logs; `limit` defaults to 50.
    pub async fn logs(
        &self,
        agent_id: &str,
        limit: Option<u32>,
    ) -> Result<serde_json::Value, ApiError> {
        let limit = limit.unwrap_or(DEFAULT_LOG_LIMIT).to_string();
        self.get(&format!("/v1/agents/{agent_id}/logs"), &[("limit", limit)])
            .await
    }

    pub async fn benchmark(&self, category: &str) -> Result<serde_json::Value, ApiError> {
        self.get("/v1/benchmark", &[("category", category.to_string())])
            .await
    }

    pub async fn service_status(&self, agent_id: &str) -> Result<serde_json::Value, ApiError> {
        self.get(&format!("/v1/services/{agent_id}"), &[]).await
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let mut url = self.base.clone();
        let base_path = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{base_path}{path}"));

        debug!(%url, "Platform API request");
        let response = self.client.get(url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, response.text().await.unwrap_or_default()));
        }
        Ok(response.json().await?)
    }
}

fn status_error(status: StatusCode, body: String) -> ApiError {
    ApiError::Status {
        status: status.as_u16(),
        body,
    }
}
