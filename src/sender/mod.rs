pub mod client;
pub mod serialization;
pub mod transmission;

pub use client::{ClientConfig, ClientError, ClientStats, ConnectionStats, HttpClient, ingest_url};
pub use serialization::{BatchSerializer, Payload, SerializationError};
pub use transmission::{BatchTransmitter, DeliveryError, DeliveryOutcome};

use crate::buffer::LogBatch;
use std::future::Future;
use std::pin::Pin;

/// Ships one batch and reports how it went.
///
/// The logger only ever talks to this trait; [`BatchTransmitter`] is the HTTP
/// implementation.
pub trait BatchDelivery: Send + Sync {
    fn deliver<'a>(
        &'a self,
        batch: &'a LogBatch,
    ) -> Pin<Box<dyn Future<Output = DeliveryOutcome> + Send + 'a>>;
}
