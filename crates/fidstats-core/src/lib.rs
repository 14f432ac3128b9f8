//! fidstats-core - Streaming activation statistics for distribution metrics
//!
//! This crate computes the mean vector and covariance matrix of feature
//! activations over an entire dataset, one batch at a time, for use in
//! Fréchet-distance-style comparisons between data distributions.
//!
//! # Key Components
//!
//! - **FeatureExtractor**: one `extract(batch, meta)` contract over a fixed
//!   feature-map model or a classifier exposing feature maps as a secondary output
//! - **StatsAggregator**: single-pass, O(D²) memory mean/covariance accumulator
//! - **Pipeline**: drives a batch source through the extractor into the aggregator
//! - **Fréchet distance**: compares two finalized statistics
//!
//! # Data Flow
//!
//! ```text
//! batch source -> FeatureExtractor -> StatsAggregator -> StatsSink
//! ```
//!
//! Dataset loading and persistence live outside this crate; the core only
//! consumes `SampleBatch` values and hands back `ActivationStatistics`.

pub mod aggregator;
pub mod batch;
pub mod config;
pub mod device;
pub mod error;
pub mod extractor;
pub mod frechet;
pub mod models;
pub mod pipeline;
pub mod sink;

pub use aggregator::*;
pub use batch::*;
pub use config::*;
pub use device::*;
pub use error::*;
pub use extractor::*;
pub use frechet::frechet_distance;
pub use models::{Flatten, MlpClassifier};
pub use pipeline::*;
pub use sink::*;
