use super::serialization::{BatchSerializer, SerializationError};
use super::{BatchDelivery, HttpClient};
use crate::buffer::LogBatch;
use reqwest::StatusCode;
use reqwest::header::{
    AUTHORIZATION, CONTENT_ENCODING, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue,
};
use std::future::Future;
use std::pin::Pin;
use std::time::Instant;
use thiserror::Error;
use tokio::time::timeout;
use tracing::debug;

// Longest server error body kept for diagnostics.
const MAX_ERROR_BODY: usize = 512;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Request timed out")]
    Timeout,
    #[error("Server error: HTTP {status}")]
    Server { status: u16 },
    #[error("Rejected by server: HTTP {status} - {body}")]
    Client { status: u16, body: String },
    #[error("Authentication rejected: HTTP {status}")]
    Auth { status: u16 },
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

impl From<SerializationError> for DeliveryError {
    fn from(err: SerializationError) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for DeliveryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(err.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { status: u16 },
    Retryable(DeliveryError),
    Fatal(DeliveryError),
}

impl DeliveryOutcome {
    pub fn from_status(status: StatusCode, body: impl FnOnce() -> String) -> Self {
        let code = status.as_u16();
        if status.is_success() {
            Self::Delivered { status: code }
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Self::Fatal(DeliveryError::Auth { status: code })
        } else if status.is_client_error() {
            Self::Fatal(DeliveryError::Client {
                status: code,
                body: body(),
            })
        } else {
            // 5xx and anything unexpected (1xx/3xx after redirects) is transient.
            Self::Retryable(DeliveryError::Server { status: code })
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

#[derive(Debug, Clone)]
pub struct BatchTransmitter {
    pub client: HttpClient,
    serializer: BatchSerializer,
}

impl BatchTransmitter {
    pub fn new(client: HttpClient) -> Self {
        let serializer = BatchSerializer::new(client.config.enable_compression);
        Self { client, serializer }
    }

    pub async fn send_batch(&self, batch: &LogBatch) -> DeliveryOutcome {
        match self.try_send(batch).await {
            Ok(outcome) => outcome,
            Err(err @ DeliveryError::Serialization(_)) => DeliveryOutcome::Fatal(err),
            Err(err) => DeliveryOutcome::Retryable(err),
        }
    }

    async fn try_send(&self, batch: &LogBatch) -> Result<DeliveryOutcome, DeliveryError> {
        let start = Instant::now();
        let payload = self.serializer.encode(batch)?;
        let headers = self.build_headers(batch, payload.compressed)?;
        let bytes_sent = payload.body.len();

        let request = self
            .client
            .client
            .post(self.client.ingest_url.clone())
            .headers(headers)
            .timeout(self.client.config.timeout)
            .body(payload.body);

        let sent = timeout(self.client.config.timeout, request.send()).await;
        let response = match sent {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                self.client.stats.record_request(false, start.elapsed());
                return Err(err.into());
            }
            Err(_) => {
                self.client.stats.record_request(false, start.elapsed());
                return Err(DeliveryError::Timeout);
            }
        };

        let status = response.status();
        let latency = start.elapsed();
        self.client.stats.record_request(status.is_success(), latency);

        debug!(
            batch_id = batch.batch_id(),
            entries = batch.len(),
            bytes = bytes_sent,
            status = status.as_u16(),
            "Ingest responded in {:?}",
            latency
        );

        let body = if status.is_client_error() {
            response.text().await.unwrap_or_default()
        } else {
            String::new()
        };

        Ok(DeliveryOutcome::from_status(status, || {
            truncate_chars(body, MAX_ERROR_BODY)
        }))
    }

    pub fn build_headers(
        &self,
        batch: &LogBatch,
        compressed: bool,
    ) -> Result<HeaderMap, DeliveryError> {
        let mut headers = HeaderMap::new();

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if compressed {
            headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        }

        let mut auth = header_value(&format!("Bearer {}", self.client.config.api_key), "api key")?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        headers.insert(
            HeaderName::from_static("x-batch-id"),
            header_value(batch.batch_id(), "batch id")?,
        );
        headers.insert(
            HeaderName::from_static("x-sdk-version"),
            header_value(batch.sdk_version(), "sdk version")?,
        );

        Ok(headers)
    }
}

impl BatchDelivery for BatchTransmitter {
    fn deliver<'a>(
        &'a self,
        batch: &'a LogBatch,
    ) -> Pin<Box<dyn Future<Output = DeliveryOutcome> + Send + 'a>> {
        Box::pin(self.send_batch(batch))
    }
}

fn header_value(value: &str, what: &str) -> Result<HeaderValue, DeliveryError> {
    HeaderValue::from_str(value)
        .map_err(|e| DeliveryError::Serialization(format!("Invalid {what} header: {e}")))
}

fn truncate_chars(mut text: String, max: usize) -> String {
    if let Some((idx, _)) = text.char_indices().nth(max) {
        text.truncate(idx);
    }
    text
}
