//! Shared helpers for fidstats-core integration tests

#![allow(dead_code)]

use ndarray::{Array1, Array2};

/// Deterministic RNG for reproducible synthetic datasets
pub struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    pub fn new(seed: u64) -> Self {
        Self {
            state: seed.wrapping_add(0x9E3779B97F4A7C15),
        }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
        z ^ (z >> 31)
    }

    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() as f64) / (u64::MAX as f64)
    }

    /// Standard normal sample (Box-Muller)
    pub fn next_gaussian(&mut self) -> f64 {
        let u1 = self.next_f64().max(1e-12);
        let u2 = self.next_f64();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }
}

/// `n` uniform rows in `[-scale, scale]^d`
pub fn uniform_rows(rng: &mut SimpleRng, n: usize, d: usize, scale: f64) -> Array2<f64> {
    Array2::from_shape_fn((n, d), |_| (rng.next_f64() * 2.0 - 1.0) * scale)
}

/// `n` rows of `mean + L z` with `z ~ N(0, I)`, so the covariance is `L Lᵀ`
pub fn gaussian_rows(
    rng: &mut SimpleRng,
    n: usize,
    mean: &Array1<f64>,
    cholesky: &Array2<f64>,
) -> Array2<f64> {
    let d = mean.len();
    let z = Array2::from_shape_fn((n, d), |_| rng.next_gaussian());
    z.dot(&cholesky.t()) + mean
}

/// Two-pass reference mean and unbiased covariance
pub fn two_pass(data: &Array2<f64>) -> (Array1<f64>, Array2<f64>) {
    let n = data.nrows() as f64;
    let mean = data.sum_axis(ndarray::Axis(0)) / n;
    let centered = data - &mean;
    let cov = centered.t().dot(&centered) / (n - 1.0);
    (mean, cov)
}

/// Largest elementwise difference, relative for magnitudes above 1 and absolute below
pub fn max_rel_diff<'a>(
    a: impl IntoIterator<Item = &'a f64>,
    b: impl IntoIterator<Item = &'a f64>,
) -> f64 {
    a.into_iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs() / x.abs().max(y.abs()).max(1.0))
        .fold(0.0, f64::max)
}
