use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BufferError {
    #[error("Invalid buffer capacity: {capacity}")]
    InvalidCapacity { capacity: usize },

    #[error("Logger is closed, entry discarded")]
    Closed,
}
