mod common;

use axum::{
    Json, Router,
    body::Body,
    http::{HeaderName, HeaderValue, StatusCode},
    middleware::from_fn_with_state,
    routing::{get, post},
};
use axum_test::TestServer;
use common::RecordingDelivery;
use gt8004_sdk::middleware::{MiddlewareOptions, RequestLogging, log_requests};
use gt8004_sdk::{LogEntry, Logger, LoggerConfig};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::net::TcpListener;
use tokio::time::{sleep, timeout};
use tokio_util::io::ReaderStream;

async fn search(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({ "results": [], "query": body["query"] }))
}

async fn broken() -> (StatusCode, &'static str) {
    (StatusCode::BAD_GATEWAY, "upstream unavailable")
}

fn logger(delivery: Arc<RecordingDelivery>) -> Logger {
    let config = LoggerConfig::new("agent-test", "test-key")
        .with_flush_interval(Duration::from_secs(60));
    Logger::with_delivery(config, delivery).unwrap()
}

fn create_test_app(logging: RequestLogging) -> Router {
    Router::new()
        .route("/mcp/tools/search", post(search))
        .route("/health", get(|| async { "ok" }))
        .route("/mcp/tools/broken", get(broken))
        .layer(from_fn_with_state(logging, log_requests))
}

async fn logged_entries(logger: &Logger, delivery: &RecordingDelivery) -> Vec<LogEntry> {
    logger.flush().await;
    delivery.entries()
}

fn header(name: &'static str, value: &'static str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static(name),
        HeaderValue::from_static(value),
    )
}

#[tokio::test]
async fn test_logs_one_entry_per_request() {
    let delivery = RecordingDelivery::new();
    let logger = logger(delivery.clone());
    let server = TestServer::new(create_test_app(RequestLogging::new(logger.clone()))).unwrap();

    let (agent_name, agent_value) = header("x-agent-id", "customer-42");
    let (fwd_name, fwd_value) = header("x-forwarded-for", "203.0.113.7, 10.0.0.1");
    let (ua_name, ua_value) = header("user-agent", "test-client/1.0");
    let response = server
        .post("/mcp/tools/search")
        .add_header(agent_name, agent_value)
        .add_header(fwd_name, fwd_value)
        .add_header(ua_name, ua_value)
        .json(&json!({ "query": "weather" }))
        .await;
    response.assert_status_ok();
    server.get("/health").await.assert_status_ok();

    let entries = logged_entries(&logger, &delivery).await;
    assert_eq!(entries.len(), 2);

    let search = &entries[0];
    assert_eq!(search.method, "POST");
    assert_eq!(search.path, "/mcp/tools/search");
    assert_eq!(search.status_code, 200);
    assert_eq!(search.tool_name.as_deref(), Some("search"));
    assert_eq!(search.customer_id.as_deref(), Some("customer-42"));
    assert_eq!(search.ip_address.as_deref(), Some("203.0.113.7"));
    assert_eq!(search.user_agent.as_deref(), Some("test-client/1.0"));
    assert_eq!(search.source, "sdk");
    assert!(search.response_ms >= 0.0);
    assert!(search.error_type.is_none());
    assert!(search.request_body.is_none());

    let health = &entries[1];
    assert_eq!(health.method, "GET");
    assert_eq!(health.tool_name.as_deref(), Some("health"));
    assert!(health.customer_id.is_none());
    assert_ne!(health.request_id, search.request_id);

    logger.close().await;
}

#[tokio::test]
async fn test_server_errors_are_tagged() {
    let delivery = RecordingDelivery::new();
    let logger = logger(delivery.clone());
    let server = TestServer::new(create_test_app(RequestLogging::new(logger.clone()))).unwrap();

    let response = server.get("/mcp/tools/broken").await;
    response.assert_status(StatusCode::BAD_GATEWAY);
    response.assert_text("upstream unavailable");

    let entries = logged_entries(&logger, &delivery).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status_code, 502);
    assert_eq!(entries[0].error_type.as_deref(), Some("HTTP_502"));

    logger.close().await;
}

#[tokio::test]
async fn test_payment_header_is_recorded() {
    let delivery = RecordingDelivery::new();
    let logger = logger(delivery.clone());
    let server = TestServer::new(create_test_app(RequestLogging::new(logger.clone()))).unwrap();

    let (name, value) = header(
        "x-payment",
        r#"{"amount":"0.05","tx_hash":"0xfeed","token":"USDC","payer":"0xabc"}"#,
    );
    server
        .post("/mcp/tools/search")
        .add_header(name, value)
        .json(&json!({ "query": "paid" }))
        .await
        .assert_status_ok();

    let entries = logged_entries(&logger, &delivery).await;
    assert_eq!(entries[0].x402_amount, Some(0.05));
    assert_eq!(entries[0].x402_tx_hash.as_deref(), Some("0xfeed"));
    assert_eq!(entries[0].x402_token.as_deref(), Some("USDC"));
    assert_eq!(entries[0].x402_payer.as_deref(), Some("0xabc"));

    logger.close().await;
}

#[tokio::test]
async fn test_body_capture_truncates_and_passes_body_through() {
    let delivery = RecordingDelivery::new();
    let logger = logger(delivery.clone());
    let options = MiddlewareOptions::default()
        .with_body_capture(12)
        .with_protocol("mcp");
    let server = TestServer::new(create_test_app(RequestLogging::with_options(
        logger.clone(),
        options,
    )))
    .unwrap();

    let response = server
        .post("/mcp/tools/search")
        .json(&json!({ "query": "a fairly long query string" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["query"], "a fairly long query string");

    let entries = logged_entries(&logger, &delivery).await;
    let entry = &entries[0];
    assert_eq!(entry.protocol.as_deref(), Some("mcp"));
    assert_eq!(entry.request_body.as_ref().map(String::len), Some(12));
    assert!(entry.request_body_size.unwrap() > 12);
    assert_eq!(entry.response_body.as_ref().map(String::len), Some(12));
    assert!(entry.response_body_size.unwrap() > 12);

    logger.close().await;
}

#[tokio::test]
async fn test_custom_extractors() {
    let delivery = RecordingDelivery::new();
    let logger = logger(delivery.clone());
    let options = MiddlewareOptions::default()
        .with_customer_id(|parts| {
            parts
                .uri
                .query()
                .and_then(|q| q.strip_prefix("customer="))
                .map(str::to_string)
        })
        .with_tool_name(|_| Some("search_tool".to_string()));
    let server = TestServer::new(create_test_app(RequestLogging::with_options(
        logger.clone(),
        options,
    )))
    .unwrap();

    server.get("/health?customer=acme").await.assert_status_ok();

    let entries = logged_entries(&logger, &delivery).await;
    assert_eq!(entries[0].customer_id.as_deref(), Some("acme"));
    assert_eq!(entries[0].tool_name.as_deref(), Some("search_tool"));
    assert_eq!(entries[0].path, "/health");

    logger.close().await;
}

#[tokio::test]
async fn test_closed_logger_does_not_break_requests() {
    let delivery = RecordingDelivery::new();
    let logger = logger(delivery.clone());
    let server = TestServer::new(create_test_app(RequestLogging::new(logger.clone()))).unwrap();
    logger.close().await;

    server.get("/health").await.assert_status_ok();

    assert_eq!(delivery.attempts(), 0);
    assert_eq!(logger.stats().dropped_closed, 1);
}

#[tokio::test]
async fn test_streamed_response_is_not_held_back() {
    let delivery = RecordingDelivery::new();
    let logger = logger(delivery.clone());
    let open_stream: Arc<Mutex<Option<DuplexStream>>> = Arc::default();

    let slot = Arc::clone(&open_stream);
    let app = Router::new()
        .route(
            "/events",
            get(move || {
                let slot = Arc::clone(&slot);
                async move {
                    let (mut writer, reader) = tokio::io::duplex(1024);
                    writer.write_all(b"data: first\n\n").await.unwrap();
                    *slot.lock().unwrap() = Some(writer);
                    Body::from_stream(ReaderStream::new(reader))
                }
            }),
        )
        .layer(from_fn_with_state(
            RequestLogging::with_options(
                logger.clone(),
                MiddlewareOptions::default().with_body_capture(64),
            ),
            log_requests,
        ));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    let mut response = timeout(
        Duration::from_secs(5),
        reqwest::get(format!("http://{addr}/events")),
    )
    .await
    .expect("headers arrive while the stream is still open")
    .unwrap();
    assert_eq!(response.status(), 200);

    let first = timeout(Duration::from_secs(5), response.chunk())
        .await
        .expect("first chunk arrives while the stream is still open")
        .unwrap()
        .unwrap();
    assert_eq!(&first[..], b"data: first\n\n");
    assert_eq!(logger.buffered(), 0, "entry waits for the end of the body");

    drop(open_stream.lock().unwrap().take());
    assert!(response.chunk().await.unwrap().is_none());

    timeout(Duration::from_secs(5), async {
        while logger.buffered() == 0 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("entry queued once the body ends");

    let entries = logged_entries(&logger, &delivery).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].path, "/events");
    assert_eq!(entries[0].response_body.as_deref(), Some("data: first\n\n"));
    assert_eq!(entries[0].response_body_size, Some(13));

    logger.close().await;
}
