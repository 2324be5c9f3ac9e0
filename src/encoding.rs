//! Size-bounded JSON encoding of sensor records

use crate::sensor::SensorRecord;
use thiserror::Error;

/// Encoding errors
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Encoded payload is {size} bytes, limit is {limit}")]
    Overflow { size: usize, limit: usize },
    #[error("Serialization error")]
    Serialization(#[source] serde_json::Error),
}

/// Encodes records into payloads no larger than `limit` bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadEncoder {
    limit: usize,
}

impl PayloadEncoder {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Compact JSON with keys in record field order
    pub fn encode(&self, record: &SensorRecord) -> Result<Vec<u8>, EncodeError> {
        let bytes = serde_json::to_vec(record).map_err(EncodeError::Serialization)?;
        if bytes.len() > self.limit {
            return Err(EncodeError::Overflow {
                size: bytes.len(),
                limit: self.limit,
            });
        }
        Ok(bytes)
    }
}

impl Default for PayloadEncoder {
    fn default() -> Self {
        Self::new(256)
    }
}
