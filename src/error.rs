//! Error types for the Kohonen training engine.

use thiserror::Error;

/// The main error type for Kohonen map operations.
#[derive(Error, Debug)]
pub enum KohonenError {
    /// Invalid configuration (malformed decay schedule, non-positive bandwidth, ...).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input vector dimension does not match the prototype dimension.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The dimension required by the map.
        expected: usize,
        /// The dimension that was supplied.
        actual: usize,
    },

    /// A unit index or grid coordinate lies outside the topology.
    #[error("Index out of range: {index} >= {max}")]
    OutOfRange {
        /// The index that was out of range.
        index: usize,
        /// The exclusive upper bound.
        max: usize,
    },

    /// NaN or infinite value where a finite number is required.
    #[error("Non-finite value: {0}")]
    NonFinite(String),

    /// Empty input.
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// Operation not permitted in the trainer's current state.
    #[error("Invalid trainer state: {0}")]
    InvalidState(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Malformed checkpoint file.
    #[error("Invalid checkpoint: {0}")]
    InvalidCheckpoint(String),

    /// No checkpoint stored under the requested tag.
    #[error("Checkpoint not found: {0}")]
    CheckpointNotFound(u64),
}

/// Result type alias for Kohonen operations.
pub type Result<T> = std::result::Result<T, KohonenError>;

impl From<bincode::Error> for KohonenError {
    fn from(err: bincode::Error) -> Self {
        KohonenError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = KohonenError::DimensionMismatch {
            expected: 2,
            actual: 3,
        };
        assert_eq!(err.to_string(), "Dimension mismatch: expected 2, got 3");

        let err = KohonenError::OutOfRange { index: 12, max: 9 };
        assert_eq!(err.to_string(), "Index out of range: 12 >= 9");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: KohonenError = io.into();
        assert!(matches!(err, KohonenError::Io(_)));
    }
}
