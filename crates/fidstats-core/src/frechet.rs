//! Fréchet distance between two Gaussian summaries
//!
//! ```text
//! d² = ‖μ₁ - μ₂‖² + tr(Σ₁) + tr(Σ₂) - 2 · tr((Σ₁^½ Σ₂ Σ₁^½)^½)
//! ```
//!
//! Both square roots go through symmetric eigendecompositions. Small negative
//! eigenvalues from rounding are clamped to zero.

use nalgebra::{DMatrix, DVector, SymmetricEigen};
use ndarray::Array2;

use crate::aggregator::ActivationStatistics;
use crate::error::{FidError, FidResult};

/// Fréchet distance between two sets of activation statistics
pub fn frechet_distance(a: &ActivationStatistics, b: &ActivationStatistics) -> FidResult<f64> {
    if a.dims() != b.dims() {
        return Err(FidError::DimensionMismatch {
            expected: a.dims(),
            actual: b.dims(),
        });
    }

    let mean_term: f64 = (&a.mean - &b.mean).mapv(|v| v * v).sum();
    let trace_a = a.covariance.diag().sum();
    let trace_b = b.covariance.diag().sum();

    let sigma_a = to_dmatrix(&a.covariance);
    let sigma_b = to_dmatrix(&b.covariance);
    let root_a = psd_sqrt(&sigma_a);
    let inner = symmetrize(&root_a * sigma_b * &root_a);
    let trace_cross: f64 = SymmetricEigen::new(inner)
        .eigenvalues
        .iter()
        .map(|&v| v.max(0.0).sqrt())
        .sum();

    Ok(mean_term + trace_a + trace_b - 2.0 * trace_cross)
}

fn to_dmatrix(m: &Array2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(m.nrows(), m.ncols(), |i, j| m[[i, j]])
}

fn symmetrize(m: DMatrix<f64>) -> DMatrix<f64> {
    (&m + m.transpose()) * 0.5
}

/// Principal square root of a symmetric positive semi-definite matrix
fn psd_sqrt(m: &DMatrix<f64>) -> DMatrix<f64> {
    let eigen = SymmetricEigen::new(symmetrize(m.clone()));
    let roots: DVector<f64> = eigen.eigenvalues.map(|v| v.max(0.0).sqrt());
    &eigen.eigenvectors * DMatrix::from_diagonal(&roots) * eigen.eigenvectors.transpose()
}
