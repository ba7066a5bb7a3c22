//! Domain layer for gt8004-sdk.
//!
//! Contains the canonical types shared across all modules:
//! - `LogEntry`: one observed request/response pair
//! - `PaymentInfo`: x402 payment metadata attached to an entry
//! - `SdkError`: Top-level error type

pub mod error;
pub mod log_entry;

pub use error::SdkError;
pub use log_entry::{LogEntry, PaymentInfo};
