//! Error types for fidstats-core
//!
//! Every failure in the core is fatal to the run it happens in:
//! - Extractor setup and probing
//! - Mid-run extraction and contract breaches
//! - Aggregator misuse (out-of-order calls, too few samples)
//! - Batch source failures

use thiserror::Error;

use crate::device::Device;

/// Main error type for statistics runs
#[derive(Error, Debug)]
pub enum FidError {
    /// The extractor could not be prepared or the probe call failed
    #[error("Feature extractor initialization failed: {0}")]
    ExtractorInitialization(String),

    /// A mid-run extractor call failed or broke its output contract
    #[error("Feature extraction failed on batch {batch}: {message}")]
    ExtractionFailure { batch: usize, message: String },

    /// Covariance is undefined for fewer than two samples
    #[error("Insufficient samples: {count} (at least 2 are required)")]
    InsufficientSamples { count: u64 },

    /// Operation called out of order
    #[error("Invalid aggregator state: {0}")]
    InvalidState(String),

    /// Empty or malformed sample batch
    #[error("Invalid batch: {0}")]
    InvalidBatch(String),

    /// Statistics of different dimensionality were combined
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The batch source failed to produce a batch
    #[error("Batch source failed: {0}")]
    Source(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Invalid run configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl FidError {
    /// Wrap a batch source error
    pub fn source(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        FidError::Source(err.into())
    }
}

/// Result type for core operations
pub type FidResult<T> = Result<T, FidError>;

/// Errors raised by model implementations behind the extractor traits
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Input or parameter shapes do not line up
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    /// The model cannot run on the requested device
    #[error("Device not supported: {0}")]
    UnsupportedDevice(Device),

    /// Backend-specific failure
    #[error("Model backend error: {0}")]
    Backend(String),
}
