use thiserror::Error;

/// Top-level error type for the SDK.
///
/// Delivery failures never surface here: they are absorbed by the logger and
/// reported through diagnostics. Only construction-time problems do.
#[derive(Error, Debug)]
pub enum SdkError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("HTTP client error: {0}")]
    Client(#[from] crate::sender::ClientError),

    #[error("Buffer error: {0}")]
    Buffer(#[from] crate::buffer::BufferError),

    #[error("No Tokio runtime available: {0}")]
    Runtime(String),
}
