use super::capture::{BodyTap, MiddlewareOptions, RequestCapture};
use crate::logger::Logger;
use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use http_body_util::BodyExt;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::trace;

/// Middleware state: the logger entries go to and the capture options.
///
/// ```ignore
/// let logging = RequestLogging::new(logger.clone());
/// let app = Router::new()
///     .route("/search", post(search))
///     .layer(axum::middleware::from_fn_with_state(logging, log_requests));
/// ```
#[derive(Clone, Debug)]
pub struct RequestLogging {
    logger: Logger,
    options: Arc<MiddlewareOptions>,
}

impl RequestLogging {
    pub fn new(logger: Logger) -> Self {
        Self::with_options(logger, MiddlewareOptions::default())
    }

    pub fn with_options(logger: Logger, options: MiddlewareOptions) -> Self {
        Self {
            logger,
            options: Arc::new(options),
        }
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }
}

/// Logs one entry per request; delivery happens in the background.
///
/// Without body capture the entry is queued as soon as the handler returns.
/// With it, both bodies stream through untouched while their first
/// `max_body_size` bytes are kept, and the entry is queued once the response
/// body has been sent or dropped.
pub async fn log_requests(
    State(state): State<RequestLogging>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let (parts, body) = request.into_parts();
    let mut capture = RequestCapture::begin_at(&parts, &state.options, started);
    if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
        capture.set_peer_ip(addr.ip().to_string());
    }

    if !state.options.capture_body {
        let response = next.run(Request::from_parts(parts, body)).await;
        let entry = capture.finish(response.status(), response.headers(), None);
        queue(&state.logger, entry);
        return response;
    }

    let limit = state.options.max_body_size;
    let request_body = Arc::new(Mutex::new(BodyTap::new(limit)));
    let sink = Arc::clone(&request_body);
    let body = Body::new(body.map_frame(move |frame| {
        if let Some(data) = frame.data_ref() {
            sink.lock().record(data);
        }
        frame
    }));

    let response = next.run(Request::from_parts(parts, body)).await;
    let (parts, body) = response.into_parts();

    let mut pending = PendingEntry {
        logger: state.logger.clone(),
        capture: Some(capture),
        status: parts.status,
        headers: parts.headers.clone(),
        request_body,
        response_body: BodyTap::new(limit),
    };
    let body = body.map_frame(move |frame| {
        if let Some(data) = frame.data_ref() {
            pending.response_body.record(data);
        }
        frame
    });
    Response::from_parts(parts, Body::new(body))
}

/// Rides along with a streaming response body and queues the entry when the
/// body is dropped.
struct PendingEntry {
    logger: Logger,
    capture: Option<RequestCapture>,
    status: StatusCode,
    headers: HeaderMap,
    request_body: Arc<Mutex<BodyTap>>,
    response_body: BodyTap,
}

impl Drop for PendingEntry {
    fn drop(&mut self) {
        let Some(mut capture) = self.capture.take() else {
            return;
        };
        capture.record_request_body(&self.request_body.lock());
        let entry = capture.finish(self.status, &self.headers, Some(&self.response_body));
        queue(&self.logger, entry);
    }
}

fn queue(logger: &Logger, entry: crate::domain::LogEntry) {
    let request_id = entry.request_id.clone();
    if logger.log(entry).is_err() {
        trace!(target: "gt8004_sdk", %request_id, "Request not logged, logger closed");
    }
}
