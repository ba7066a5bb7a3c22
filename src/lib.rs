#![warn(rust_2024_compatibility)]
// Specific pedantic lints enforced (not blanket allow):
#![deny(
    clippy::explicit_iter_loop,
    clippy::manual_let_else,
    clippy::semicolon_if_nothing_returned,
    clippy::inconsistent_struct_constructor
)]
// Noisy pedantic lints suppressed with justification:
#![allow(
    clippy::cast_lossless,            // Infallible casts are clear enough with `as`
    clippy::cast_possible_truncation, // Safe within realistic value bounds (durations, sizes)
    clippy::cast_precision_loss,      // Acceptable for metrics/display
    clippy::cast_sign_loss,           // Safe where values are known non-negative
    clippy::missing_errors_doc,       // Error enums document themselves
    clippy::module_name_repetitions,  // e.g. ConfigError in config module
    clippy::must_use_candidate,       // Annotated selectively on critical APIs
    clippy::doc_markdown
)]

//! Request telemetry for GT8004 agents.
//!
//! Build a [`Logger`] from a [`LoggerConfig`], push one [`LogEntry`] per
//! handled request (by hand or through the [`middleware`]), and the logger
//! batches and delivers them to the ingest endpoint in the background. Call
//! [`Logger::close`] before the process exits.

pub mod app;
pub mod buffer;
pub mod client;
pub mod config;
pub mod domain;
pub mod logger;
pub mod middleware;
pub mod reliability;
pub mod sender;

pub use buffer::{FlushTrigger, LogBatch, SDK_VERSION};
pub use client::{ApiError, PlatformClient, SearchParams};
pub use config::{ConfigError, LoggerConfig};
pub use domain::{LogEntry, PaymentInfo, SdkError};
pub use logger::Logger;
pub use reliability::{DropReason, StatsSnapshot};
pub use sender::{BatchDelivery, DeliveryError, DeliveryOutcome};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
