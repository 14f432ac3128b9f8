//! Run configuration
//!
//! Parameters of a single statistics run: batching, prefetching, device and
//! covariance normalization.

use serde::{Deserialize, Serialize};

use crate::aggregator::CovarianceNormalization;
use crate::device::Device;
use crate::error::{FidError, FidResult};

/// Configuration for one statistics run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Samples per batch
    pub batch_size: usize,
    /// Prefetch buffering: batches are read ahead by a single background
    /// thread into `2 * num_workers` slots. 0 reads batches on the calling
    /// thread. This does not add loader threads.
    pub num_workers: usize,
    /// Device the extractor runs on
    pub device: Device,
    /// Covariance denominator
    pub covariance: CovarianceNormalization,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            batch_size: 64,
            num_workers: 6,
            device: Device::Cpu,
            covariance: CovarianceNormalization::Unbiased,
        }
    }
}

impl RunConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of batches buffered ahead of the consumer (two per worker slot)
    pub fn prefetch_depth(&self) -> usize {
        self.num_workers * 2
    }

    /// Validate configuration values
    pub fn validate(&self) -> FidResult<()> {
        if self.batch_size == 0 {
            return Err(FidError::InvalidConfig(
                "batch_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RunConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.batch_size, 64);
        assert_eq!(config.prefetch_depth(), 12);
    }

    #[test]
    fn test_zero_batch_size() {
        let config = RunConfig {
            batch_size: 0,
            ..RunConfig::default()
        };
        assert!(matches!(config.validate(), Err(FidError::InvalidConfig(_))));
    }

    #[test]
    fn test_json_partial() {
        let json = r#"{"batch_size": 32, "device": "cuda:1", "covariance": "population"}"#;
        let config: RunConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.num_workers, 6);
        assert_eq!(config.device, Device::Cuda(1));
        assert_eq!(config.covariance, CovarianceNormalization::Population);
    }

    #[test]
    fn test_num_workers_sets_buffer_depth() {
        let sequential = RunConfig {
            num_workers: 0,
            ..RunConfig::default()
        };
        assert_eq!(sequential.prefetch_depth(), 0);
        assert!(sequential.validate().is_ok());

        let buffered = RunConfig {
            num_workers: 3,
            ..RunConfig::default()
        };
        assert_eq!(buffered.prefetch_depth(), 6);
    }
}
