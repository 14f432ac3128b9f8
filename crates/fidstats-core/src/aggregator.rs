//! Streaming mean/covariance aggregation
//!
//! [`StatsAggregator`] folds feature batches into a count, a running mean and a
//! running co-moment matrix `M = Σ (x - mean)(x - mean)ᵀ`, all in `f64`. The
//! triple is equivalent to the raw sums `(N, Σx, Σxxᵀ)`:
//!
//! ```text
//! Σx   = N · mean
//! Σxxᵀ = M + N · mean · meanᵀ
//! ```
//!
//! but avoids subtracting two large, nearly equal quantities at the end.
//! Each batch is centered on its own mean and combined with the running state
//! using the pairwise update of Chan, Golub & LeVeque:
//!
//! ```text
//! δ     = mean_b - mean_a
//! mean  = mean_a + δ · n_b / n
//! M     = M_a + M_b + δ δᵀ · n_a n_b / n
//! ```
//!
//! Memory is O(D²) no matter how many samples pass through, and batching does
//! not change the result beyond floating-point rounding.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{FidError, FidResult};
use crate::frechet;

/// Denominator used when turning the co-moment matrix into a covariance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CovarianceNormalization {
    /// Divide by `N - 1` (Bessel-corrected, the `numpy.cov` default)
    #[default]
    Unbiased,
    /// Divide by `N`
    Population,
}

impl CovarianceNormalization {
    fn denominator(&self, count: u64) -> f64 {
        match self {
            CovarianceNormalization::Unbiased => (count - 1) as f64,
            CovarianceNormalization::Population => count as f64,
        }
    }
}

/// Lifecycle of an aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorPhase {
    /// No batch folded in yet
    Created,
    /// At least one batch folded in
    Accumulating,
    /// Statistics have been produced; terminal
    Finalized,
    /// An operation failed; terminal
    Failed,
}

impl AggregatorPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AggregatorPhase::Finalized | AggregatorPhase::Failed)
    }
}

/// Final mean and covariance of a dataset's feature vectors
#[derive(Debug, Clone, PartialEq)]
pub struct ActivationStatistics {
    /// Mean feature vector (length D)
    pub mean: Array1<f64>,
    /// Covariance matrix (D x D, symmetric)
    pub covariance: Array2<f64>,
    /// Number of samples the statistics were computed from
    pub count: u64,
}

impl ActivationStatistics {
    /// Feature dimensionality D
    pub fn dims(&self) -> usize {
        self.mean.len()
    }

    /// Fréchet distance to another set of statistics
    pub fn frechet_distance(&self, other: &ActivationStatistics) -> FidResult<f64> {
        frechet::frechet_distance(self, other)
    }
}

/// Single-owner streaming accumulator for mean and covariance
///
/// `Created -> Accumulating -> Finalized`, with any failure moving to `Failed`.
/// Both terminal phases reject every further operation with
/// [`FidError::InvalidState`].
#[derive(Debug, Clone)]
pub struct StatsAggregator {
    dims: usize,
    count: u64,
    batches: usize,
    mean: Array1<f64>,
    comoment: Array2<f64>,
    normalization: CovarianceNormalization,
    phase: AggregatorPhase,
}

impl StatsAggregator {
    /// Create an empty aggregator for D-dimensional features
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            count: 0,
            batches: 0,
            mean: Array1::zeros(dims),
            comoment: Array2::zeros((dims, dims)),
            normalization: CovarianceNormalization::default(),
            phase: AggregatorPhase::Created,
        }
    }

    pub fn with_normalization(mut self, normalization: CovarianceNormalization) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Samples folded in so far (N)
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Batches folded in so far
    pub fn batches(&self) -> usize {
        self.batches
    }

    pub fn phase(&self) -> AggregatorPhase {
        self.phase
    }

    pub fn normalization(&self) -> CovarianceNormalization {
        self.normalization
    }

    /// Fold a `(B, D)` feature batch into the running statistics
    ///
    /// Values are widened to `f64` before any arithmetic. An empty batch, a
    /// wrong column count or a non-finite value fails the aggregator.
    pub fn update<A>(&mut self, features: ArrayView2<'_, A>) -> FidResult<()>
    where
        A: Copy + Into<f64>,
    {
        self.ensure_live("update")?;

        let batch = self.batches;
        let features = features.mapv(Into::<f64>::into);
        if let Err(message) = self.check_batch(&features) {
            self.phase = AggregatorPhase::Failed;
            return Err(FidError::ExtractionFailure { batch, message });
        }

        let rows = features.nrows();
        let Some(batch_mean) = features.mean_axis(Axis(0)) else {
            self.phase = AggregatorPhase::Failed;
            return Err(FidError::ExtractionFailure {
                batch,
                message: "empty feature batch".to_string(),
            });
        };
        let centered = &features - &batch_mean;
        let batch_comoment = centered.t().dot(&centered);

        self.combine(rows as u64, &batch_mean, &batch_comoment);
        self.batches += 1;
        self.phase = AggregatorPhase::Accumulating;

        debug!(batch, rows, total = self.count, "Folded feature batch");
        Ok(())
    }

    /// Fold another live aggregator of the same dimensionality into this one
    pub fn merge(&mut self, other: &StatsAggregator) -> FidResult<()> {
        self.ensure_live("merge")?;
        other.ensure_live("merge")?;
        if other.dims != self.dims {
            return Err(FidError::DimensionMismatch {
                expected: self.dims,
                actual: other.dims,
            });
        }
        if other.count == 0 {
            return Ok(());
        }

        self.combine(other.count, &other.mean, &other.comoment);
        self.batches += other.batches;
        self.phase = AggregatorPhase::Accumulating;
        Ok(())
    }

    /// Produce the final statistics; callable once
    pub fn finalize(&mut self) -> FidResult<ActivationStatistics> {
        self.ensure_live("finalize")?;

        if self.count < 2 {
            self.phase = AggregatorPhase::Failed;
            return Err(FidError::InsufficientSamples { count: self.count });
        }

        let mut covariance = &self.comoment / self.normalization.denominator(self.count);
        // Exact symmetry; the batched updates are only symmetric up to rounding
        let transposed = covariance.t().to_owned();
        covariance += &transposed;
        covariance *= 0.5;

        let flat = covariance.diag().iter().filter(|&&v| v == 0.0).count();
        if flat > 0 {
            warn!(dims = flat, "Feature dimensions with zero variance");
        }

        self.phase = AggregatorPhase::Finalized;
        Ok(ActivationStatistics {
            mean: self.mean.clone(),
            covariance,
            count: self.count,
        })
    }

    /// Discard the accumulated state; the aggregator becomes unusable
    pub fn abort(&mut self) {
        if self.phase != AggregatorPhase::Finalized {
            self.phase = AggregatorPhase::Failed;
        }
    }

    fn ensure_live(&self, operation: &str) -> FidResult<()> {
        match self.phase {
            AggregatorPhase::Finalized => Err(FidError::InvalidState(format!(
                "{} called after finalize",
                operation
            ))),
            AggregatorPhase::Failed => Err(FidError::InvalidState(format!(
                "{} called on a failed aggregator",
                operation
            ))),
            AggregatorPhase::Created | AggregatorPhase::Accumulating => Ok(()),
        }
    }

    fn check_batch(&self, features: &Array2<f64>) -> Result<(), String> {
        if features.nrows() == 0 {
            return Err("empty feature batch".to_string());
        }
        if features.ncols() != self.dims {
            return Err(format!(
                "expected {} feature columns, got {}",
                self.dims,
                features.ncols()
            ));
        }
        if features.iter().any(|v| !v.is_finite()) {
            return Err("non-finite feature value".to_string());
        }
        Ok(())
    }

    fn combine(&mut self, n_b: u64, mean_b: &Array1<f64>, comoment_b: &Array2<f64>) {
        let n_a = self.count as f64;
        let n_b_f = n_b as f64;
        let n = n_a + n_b_f;

        let delta = mean_b - &self.mean;
        self.mean.scaled_add(n_b_f / n, &delta);

        self.comoment += comoment_b;
        let column = delta.view().insert_axis(Axis(1));
        let row = delta.view().insert_axis(Axis(0));
        self.comoment.scaled_add(n_a * n_b_f / n, &column.dot(&row));

        self.count += n_b;
    }
}
