//! Multivariate normal sampling over a (possibly singular) covariance.
//!
//! Σ is factored as `A = V·diag(√λ⁺)` from its symmetric eigendecomposition,
//! so `x = μ + A·z` with `z ~ N(0, I)` has covariance Σ even when Σ is only
//! positive semi-definite. A zero covariance yields exactly `μ`.
//!
//! Portfolio simulations only need `wᵀx`, which is itself normal with mean
//! `wᵀμ` and loading vector `Aᵀw`; [`PortfolioSampler`] draws that scalar in
//! O(n) per sample without materialising the asset vector.

use nalgebra::{DMatrix, DVector, SymmetricEigen};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::error::{DataError, Result};

/// Eigenvalues below `-PSD_TOLERANCE · max(1, |λ|max)` are rejected.
const PSD_TOLERANCE: f64 = 1e-8;

/// A multivariate normal distribution `N(μ, Σ)`.
#[derive(Clone, Debug)]
pub struct MultivariateNormal {
    mean: DVector<f64>,
    factor: DMatrix<f64>,
}

impl MultivariateNormal {
    pub fn new(mean: &[f64], covariance: &DMatrix<f64>) -> Result<Self> {
        let n = mean.len();
        if n == 0 {
            return Err(DataError::Empty("mean vector").into());
        }
        if covariance.nrows() != n || covariance.ncols() != n {
            return Err(DataError::DimensionMismatch {
                what: "covariance",
                expected: n,
                got: covariance.nrows(),
            }
            .into());
        }
        if mean.iter().any(|m| !m.is_finite()) || covariance.iter().any(|c| !c.is_finite()) {
            return Err(DataError::NonFinite("distribution parameters").into());
        }

        let eigen = SymmetricEigen::new(covariance.clone());
        let scale = eigen.eigenvalues.amax().max(1.0);
        let min_eigenvalue = eigen.eigenvalues.min();
        if min_eigenvalue < -PSD_TOLERANCE * scale {
            return Err(DataError::NotPositiveSemiDefinite { min_eigenvalue }.into());
        }

        let roots = eigen.eigenvalues.map(|l| l.max(0.0).sqrt());
        let factor = eigen.eigenvectors * DMatrix::from_diagonal(&roots);

        Ok(Self {
            mean: DVector::from_column_slice(mean),
            factor,
        })
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Draw one vector.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> DVector<f64> {
        let z = DVector::from_fn(self.dim(), |_, _| rng.sample::<f64, _>(StandardNormal));
        &self.mean + &self.factor * z
    }

    /// Distribution of `wᵀx` for fixed weights `w`.
    pub fn portfolio(&self, weights: &[f64]) -> Result<PortfolioSampler> {
        if weights.len() != self.dim() {
            return Err(DataError::DimensionMismatch {
                what: "weights",
                expected: self.dim(),
                got: weights.len(),
            }
            .into());
        }
        let w = DVector::from_column_slice(weights);
        let mean = w.dot(&self.mean);
        let loadings = self.factor.tr_mul(&w);
        Ok(PortfolioSampler {
            mean,
            loadings: loadings.iter().copied().filter(|l| *l != 0.0).collect(),
        })
    }
}

/// Scalar sampler for a fixed-weight portfolio return.
#[derive(Clone, Debug)]
pub struct PortfolioSampler {
    mean: f64,
    loadings: Vec<f64>,
}

impl PortfolioSampler {
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Standard deviation of the portfolio return.
    pub fn std_dev(&self) -> f64 {
        self.loadings.iter().map(|l| l * l).sum::<f64>().sqrt()
    }

    /// Draw one portfolio return.
    #[inline]
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let shock: f64 = self
            .loadings
            .iter()
            .map(|l| l * rng.sample::<f64, _>(StandardNormal))
            .sum();
        self.mean + shock
    }
}
