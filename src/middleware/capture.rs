use crate::domain::{LogEntry, PaymentInfo};
use http::header::{ACCEPT_LANGUAGE, CONTENT_LENGTH, CONTENT_TYPE, REFERER, USER_AGENT};
use http::request::Parts;
use http::{HeaderMap, StatusCode};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

pub const DEFAULT_CUSTOMER_ID_HEADER: &str = "x-agent-id";
pub const PAYMENT_HEADER: &str = "x-payment";
pub const DEFAULT_MAX_BODY_SIZE: usize = 16 * 1024;

/// Pulls a value out of an incoming request.
pub type Extractor = Arc<dyn Fn(&Parts) -> Option<String> + Send + Sync>;

/// How requests are turned into log entries.
#[derive(Clone)]
pub struct MiddlewareOptions {
    pub extract_customer_id: Option<Extractor>,
    pub extract_tool_name: Option<Extractor>,
    /// Header read for the customer id when no extractor is set.
    pub customer_id_header: String,
    pub capture_body: bool,
    pub max_body_size: usize,
    pub protocol: Option<String>,
}

impl Default for MiddlewareOptions {
    fn default() -> Self {
        Self {
            extract_customer_id: None,
            extract_tool_name: None,
            customer_id_header: DEFAULT_CUSTOMER_ID_HEADER.to_string(),
            capture_body: false,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            protocol: None,
        }
    }
}

impl std::fmt::Debug for MiddlewareOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareOptions")
            .field("extract_customer_id", &self.extract_customer_id.is_some())
            .field("extract_tool_name", &self.extract_tool_name.is_some())
            .field("customer_id_header", &self.customer_id_header)
            .field("capture_body", &self.capture_body)
            .field("max_body_size", &self.max_body_size)
            .field("protocol", &self.protocol)
            .finish()
    }
}

impl MiddlewareOptions {
    pub fn with_customer_id<F>(mut self, extract: F) -> Self
    where
        F: Fn(&Parts) -> Option<String> + Send + Sync + 'static,
    {
        self.extract_customer_id = Some(Arc::new(extract));
        self
    }

    pub fn with_tool_name<F>(mut self, extract: F) -> Self
    where
        F: Fn(&Parts) -> Option<String> + Send + Sync + 'static,
    {
        self.extract_tool_name = Some(Arc::new(extract));
        self
    }

    pub fn with_customer_id_header(mut self, header: impl Into<String>) -> Self {
        self.customer_id_header = header.into();
        self
    }

    pub fn with_body_capture(mut self, max_body_size: usize) -> Self {
        self.capture_body = true;
        self.max_body_size = max_body_size;
        self
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }
}

/// Everything known about a request before the handler runs.
///
/// Created when the request arrives and turned into a [`LogEntry`] once the
/// response is ready, so `response_ms` covers the whole handler.
#[derive(Debug)]
pub struct RequestCapture {
    started: Instant,
    entry: LogEntry,
    max_body_size: usize,
}

/// The first `limit` bytes of a body as it streams past, plus its full length.
#[derive(Debug, Clone, Default)]
pub struct BodyTap {
    kept: Vec<u8>,
    total: u64,
    limit: usize,
}

impl BodyTap {
    pub fn new(limit: usize) -> Self {
        Self {
            kept: Vec::new(),
            total: 0,
            limit,
        }
    }

    pub fn record(&mut self, chunk: &[u8]) {
        self.total += chunk.len() as u64;
        let room = self.limit.saturating_sub(self.kept.len());
        self.kept.extend_from_slice(&chunk[..room.min(chunk.len())]);
    }

    pub fn kept(&self) -> &[u8] {
        &self.kept
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}

impl RequestCapture {
    pub fn begin(parts: &Parts, options: &MiddlewareOptions) -> Self {
        Self::begin_at(parts, options, Instant::now())
    }

    /// Like [`begin`](Self::begin), timing the request from `started`.
    pub fn begin_at(parts: &Parts, options: &MiddlewareOptions, started: Instant) -> Self {
        let headers = &parts.headers;
        let path = parts.uri.path().to_string();

        let customer_id = match &options.extract_customer_id {
            Some(extract) => extract(parts),
            None => header_str(headers, &options.customer_id_header),
        };
        let tool_name = match &options.extract_tool_name {
            Some(extract) => extract(parts),
            None => Some(tool_from_path(&path)),
        };

        let mut entry = LogEntry::new(parts.method.as_str(), path, 0, 0.0);
        entry.customer_id = customer_id;
        entry.tool_name = tool_name;
        entry.protocol = options.protocol.clone();
        entry.request_body_size = content_length(headers);

        if let Some(payment) = header_str(headers, PAYMENT_HEADER)
            .as_deref()
            .and_then(parse_payment_header)
        {
            entry = entry.with_payment(payment);
        }

        entry.ip_address = client_ip(headers);
        entry.user_agent = header_str(headers, USER_AGENT.as_str());
        entry.referer = header_str(headers, REFERER.as_str());
        entry.content_type = header_str(headers, CONTENT_TYPE.as_str());
        entry.accept_language = header_str(headers, ACCEPT_LANGUAGE.as_str());
        entry.headers = header_snapshot(&entry);

        Self {
            started,
            entry,
            max_body_size: options.max_body_size,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.entry.request_id
    }

    /// Fills the client address from the transport when no proxy header had it.
    pub fn set_peer_ip(&mut self, ip: impl Into<String>) {
        if self.entry.ip_address.is_none() {
            self.entry.ip_address = Some(ip.into());
        }
    }

    pub fn record_request_body(&mut self, body: &BodyTap) {
        self.entry.request_body = truncate_body(body.kept(), self.max_body_size);
        self.entry.request_body_size.get_or_insert(body.total());
    }

    /// Completes the entry with response data.
    pub fn finish(
        self,
        status: StatusCode,
        response_headers: &HeaderMap,
        response_body: Option<&BodyTap>,
    ) -> LogEntry {
        let mut entry = self.entry;
        entry.status_code = status.as_u16();
        entry.response_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        if status.is_server_error() {
            entry.error_type = Some(format!("HTTP_{}", status.as_u16()));
        }

        entry.response_body_size = content_length(response_headers);
        if let Some(body) = response_body {
            entry.response_body = truncate_body(body.kept(), self.max_body_size);
            entry.response_body_size.get_or_insert(body.total());
        }

        entry.timestamp = crate::domain::log_entry::now_timestamp();
        entry
    }
}

/// Parses the `x-payment` header JSON. Returns `None` for anything malformed.
pub fn parse_payment_header(raw: &str) -> Option<PaymentInfo> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;

    let text = |key: &str| {
        object
            .get(key)
            .and_then(serde_json::Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let amount = match object.get("amount") {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    Some(PaymentInfo {
        amount: amount.filter(|a| a.is_finite()),
        tx_hash: text("tx_hash"),
        token: text("token"),
        payer: text("payer"),
    })
}

/// Last non-empty path segment, e.g. `/mcp/agent-19/chat` gives `chat`.
pub fn tool_from_path(path: &str) -> String {
    path.split('/')
        .rfind(|segment| !segment.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

/// Client address from `x-forwarded-for` (first hop) or `x-real-ip`.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    header_str(headers, "x-forwarded-for")
        .and_then(|value| {
            value
                .split(',')
                .map(str::trim)
                .find(|hop| !hop.is_empty())
                .map(str::to_string)
        })
        .or_else(|| header_str(headers, "x-real-ip"))
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    header_str(headers, CONTENT_LENGTH.as_str()).and_then(|value| value.parse().ok())
}

fn header_snapshot(entry: &LogEntry) -> Option<BTreeMap<String, String>> {
    let snapshot: BTreeMap<String, String> = [
        (USER_AGENT.as_str(), &entry.user_agent),
        (CONTENT_TYPE.as_str(), &entry.content_type),
        (REFERER.as_str(), &entry.referer),
    ]
    .into_iter()
    .filter_map(|(name, value)| value.clone().map(|v| (name.to_string(), v)))
    .collect();

    (!snapshot.is_empty()).then_some(snapshot)
}

fn truncate_body(body: &[u8], max: usize) -> Option<String> {
    if body.is_empty() {
        return None;
    }
    let text = String::from_utf8_lossy(&body[..body.len().min(max)]);
    // A cut through a multi-byte character shows up as a trailing U+FFFD.
    Some(text.trim_end_matches('\u{FFFD}').to_string())
}
