use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

pub const DEFAULT_SOURCE: &str = "sdk";

/// One observed request/response pair, ready for batching and transmission.
///
/// Field names follow the ingest API (camelCase on the wire). Optional fields
/// are omitted from the payload when unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    pub method: String,
    pub path: String,
    pub status_code: u16,
    pub response_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,

    // x402 payment metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x402_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x402_tx_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x402_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x402_payer: Option<String>,

    // Bodies (captured only when enabled, already truncated)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_body_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default = "default_source")]
    pub source: String,

    // Client network metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accept_language: Option<String>,

    pub timestamp: String,
}

fn default_source() -> String {
    DEFAULT_SOURCE.to_string()
}

/// Payment metadata carried by the `x-payment` request header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentInfo {
    pub amount: Option<f64>,
    pub tx_hash: Option<String>,
    pub token: Option<String>,
    pub payer: Option<String>,
}

impl LogEntry {
    /// Creates an entry with a fresh request id and the current UTC timestamp.
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        status_code: u16,
        response_ms: f64,
    ) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            customer_id: None,
            tool_name: None,
            method: method.into(),
            path: path.into(),
            status_code,
            response_ms: response_ms.max(0.0),
            error_type: None,
            x402_amount: None,
            x402_tx_hash: None,
            x402_token: None,
            x402_payer: None,
            request_body_size: None,
            response_body_size: None,
            request_body: None,
            response_body: None,
            headers: None,
            protocol: None,
            source: default_source(),
            ip_address: None,
            user_agent: None,
            referer: None,
            content_type: None,
            accept_language: None,
            timestamp: now_timestamp(),
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn with_customer_id(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn with_tool_name(mut self, tool_name: impl Into<String>) -> Self {
        self.tool_name = Some(tool_name.into());
        self
    }

    pub fn with_error_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = Some(error_type.into());
        self
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    pub fn with_payment(mut self, payment: PaymentInfo) -> Self {
        self.x402_amount = payment.amount;
        self.x402_tx_hash = payment.tx_hash;
        self.x402_token = payment.token;
        self.x402_payer = payment.payer;
        self
    }

    /// Rough in-memory footprint, used for buffer accounting and benchmarks.
    pub fn estimated_size(&self) -> usize {
        let base_size = std::mem::size_of::<LogEntry>();
        let string_sizes = self.request_id.len()
            + self.method.len()
            + self.path.len()
            + self.source.len()
            + self.timestamp.len();

        let optional_sizes = [
            &self.customer_id,
            &self.tool_name,
            &self.error_type,
            &self.x402_tx_hash,
            &self.x402_token,
            &self.x402_payer,
            &self.request_body,
            &self.response_body,
            &self.protocol,
            &self.ip_address,
            &self.user_agent,
            &self.referer,
            &self.content_type,
            &self.accept_language,
        ]
        .iter()
        .map(|field| field.as_deref().map_or(0, str::len))
        .sum::<usize>();

        let header_sizes = self.headers.as_ref().map_or(0, |headers| {
            headers.iter().map(|(k, v)| k.len() + v.len()).sum()
        });

        base_size + string_sizes + optional_sizes + header_sizes
    }
}

/// ISO-8601 UTC timestamp with millisecond precision and a `Z` suffix.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
