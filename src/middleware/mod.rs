//! Turns inbound HTTP traffic into log entries.
//!
//! [`capture`] works on plain `http` types so any server can use it; the
//! `axum` feature adds a ready-made layer.

#[cfg(feature = "axum")]
pub mod axum_layer;
pub mod capture;

#[cfg(feature = "axum")]
pub use axum_layer::{RequestLogging, log_requests};
pub use capture::{
    BodyTap, Extractor, MiddlewareOptions, RequestCapture, client_ip, parse_payment_header,
    tool_from_path,
};
