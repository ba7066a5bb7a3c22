use crate::buffer::LogBatch;
use flate2::{Compression, write::GzEncoder};
use std::io::Write;
use thiserror::Error;

// Rough upper bound per entry, used to pre-size the output buffer.
const ESTIMATED_ENTRY_SIZE: usize = 512;
const METADATA_OVERHEAD: usize = 256;
const MAX_PREALLOCATION: usize = 16 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum SerializationError {
    #[error("JSON serialization failed: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("IO error during serialization: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Batch is empty")]
    EmptyBatch,
}

/// An encoded request body.
#[derive(Debug, Clone)]
pub struct Payload {
    pub body: Vec<u8>,
    pub compressed: bool,
}

/// Encodes batches as the JSON envelope the ingest endpoint accepts.
#[derive(Debug, Clone, Default)]
pub struct BatchSerializer {
    compress: bool,
}

impl BatchSerializer {
    pub fn new(compress: bool) -> Self {
        Self { compress }
    }

    pub fn serialize_json(&self, batch: &LogBatch) -> Result<Vec<u8>, SerializationError> {
        if batch.is_empty() {
            return Err(SerializationError::EmptyBatch);
        }

        let mut buffer = Vec::with_capacity(self.estimate_serialized_size(batch));
        serde_json::to_writer(&mut buffer, batch)?;
        Ok(buffer)
    }

    /// Serializes and, when compression is on, gzips the body.
    pub fn encode(&self, batch: &LogBatch) -> Result<Payload, SerializationError> {
        let json = self.serialize_json(batch)?;
        if !self.compress {
            return Ok(Payload {
                body: json,
                compressed: false,
            });
        }

        let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
        encoder.write_all(&json)?;
        Ok(Payload {
            body: encoder.finish()?,
            compressed: true,
        })
    }

    pub fn estimate_serialized_size(&self, batch: &LogBatch) -> usize {
        batch
            .entries()
            .iter()
            .map(|entry| entry.estimated_size().max(ESTIMATED_ENTRY_SIZE / 4))
            .sum::<usize>()
            .saturating_add(METADATA_OVERHEAD)
            .min(MAX_PREALLOCATION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LogEntry;
    use flate2::read::GzDecoder;
    use std::io::Read;

    fn sample_batch() -> LogBatch {
        LogBatch::with_id(
            "agent-1",
            "batch-1",
            vec![
                LogEntry::new("POST", "/api/search", 200, 12.5).with_request_id("req-1"),
                LogEntry::new("GET", "/health", 503, 1.0).with_request_id("req-2"),
            ],
        )
    }

    #[test]
    fn test_serialize_json_envelope() {
        let serializer = BatchSerializer::new(false);
        let payload = serializer.encode(&sample_batch()).unwrap();
        assert!(!payload.compressed);

        let value: serde_json::Value = serde_json::from_slice(&payload.body).unwrap();
        assert_eq!(value["agent_id"], "agent-1");
        assert_eq!(value["batch_id"], "batch-1");
        assert_eq!(value["entries"].as_array().unwrap().len(), 2);
        assert_eq!(value["entries"][1]["statusCode"], 503);
    }

    #[test]
    fn test_compressed_payload_inflates_to_json() {
        let serializer = BatchSerializer::new(true);
        let payload = serializer.encode(&sample_batch()).unwrap();
        assert!(payload.compressed);

        let mut decoded = String::new();
        GzDecoder::new(payload.body.as_slice())
            .read_to_string(&mut decoded)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&decoded).unwrap();
        assert_eq!(value["entries"][0]["requestId"], "req-1");
    }

    #[test]
    fn test_empty_batch_is_rejected() {
        let serializer = BatchSerializer::default();
        let batch = LogBatch::new("agent-1", Vec::new());
        assert!(matches!(
            serializer.serialize_json(&batch),
            Err(SerializationError::EmptyBatch)
        ));
    }
}
