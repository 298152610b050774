//! Long-only weight optimizer with a volatility target.
//!
//! Maximises the Sharpe-like ratio `wᵀμ / √(wᵀΣw)` of a selected sub-portfolio
//! while a smooth penalty `c · ((vol − target)/target)²` pulls volatility
//! toward a target interpolated between the global-minimum-variance
//! volatility and the most volatile single asset.
//!
//! The feasible set is the capped simplex `{Σw = 1, min_weight ≤ wᵢ ≤ 1}`.
//! The solver is projected gradient descent with Armijo backtracking; the
//! projection is found by bisection on the shift `θ` in
//! `wᵢ = clamp(vᵢ − θ, min_weight, 1)`.
//!
//! Outputs are either valid [`Weights`] (finite, non-negative, summing to
//! one, respecting the floor) or an error. Nothing unnormalised escapes.

use log::debug;
use nalgebra::{DMatrix, DVector};

use crate::error::{DataError, OptimizationError, Result};
use crate::estimates::MarketEstimates;
use crate::types::{RiskTolerance, Selection, Weights};

/// Pseudo-inverse singular-value cutoff.
const PINV_EPS: f64 = 1e-12;
/// Volatility floor inside the objective.
const VOL_FLOOR: f64 = 1e-12;
const ARMIJO_C: f64 = 1e-4;
const MAX_BACKTRACKS: usize = 60;
const MAX_STEP: f64 = 16.0;
const BISECTION_ITERS: usize = 200;

/// Projected-gradient weight optimizer.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WeightOptimizer {
    /// Iteration cap before [`OptimizationError::NotConverged`].
    pub max_iterations: usize,
    /// Stationarity tolerance on the projected-gradient residual (∞-norm).
    pub tolerance: f64,
    /// Coefficient of the volatility-target penalty.
    pub vol_penalty: f64,
}

impl Default for WeightOptimizer {
    fn default() -> Self {
        Self {
            max_iterations: 10_000,
            tolerance: 1e-9,
            vol_penalty: 0.1,
        }
    }
}

impl WeightOptimizer {
    /// Validate the tunables.
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(DataError::OutOfRange {
                field: "max_iterations",
                value: 0.0,
                range: "[1, ∞)",
            }
            .into());
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(DataError::OutOfRange {
                field: "tolerance",
                value: self.tolerance,
                range: "(0, ∞)",
            }
            .into());
        }
        if !(self.vol_penalty.is_finite() && self.vol_penalty >= 0.0) {
            return Err(DataError::OutOfRange {
                field: "vol_penalty",
                value: self.vol_penalty,
                range: "[0, ∞)",
            }
            .into());
        }
        Ok(())
    }

    /// Weights for `selection` drawn from `estimates`.
    pub fn optimize(
        &self,
        selection: &Selection,
        estimates: &MarketEstimates,
        risk: RiskTolerance,
        min_weight: f64,
    ) -> Result<Weights> {
        if selection.is_empty() {
            return Err(OptimizationError::EmptySelection.into());
        }
        let sub = estimates.subset_by_symbols(selection.symbols())?;
        let values = self.optimize_raw(sub.expected_returns(), sub.covariance(), risk, min_weight)?;
        Weights::new(selection.symbols().to_vec(), values)
    }

    /// Weights over an explicit `(μ, Σ)` pair.
    pub fn optimize_raw(
        &self,
        mu: &[f64],
        cov: &DMatrix<f64>,
        risk: RiskTolerance,
        min_weight: f64,
    ) -> Result<Vec<f64>> {
        self.validate()?;
        let n = mu.len();
        if n == 0 {
            return Err(OptimizationError::EmptySelection.into());
        }
        if cov.nrows() != n || cov.ncols() != n {
            return Err(DataError::DimensionMismatch {
                what: "covariance",
                expected: n,
                got: cov.nrows(),
            }
            .into());
        }
        if mu.iter().any(|m| !m.is_finite()) || cov.iter().any(|c| !c.is_finite()) {
            return Err(DataError::NonFinite("optimizer inputs").into());
        }
        if !(min_weight.is_finite() && min_weight >= 0.0) {
            return Err(DataError::OutOfRange {
                field: "min_weight",
                value: min_weight,
                range: "[0, 1/k]",
            }
            .into());
        }
        if min_weight * n as f64 > 1.0 + 1e-12 {
            return Err(OptimizationError::InfeasibleFloor {
                min_weight,
                assets: n,
            }
            .into());
        }
        if n == 1 {
            return Ok(vec![1.0]);
        }

        let target = VolatilityTarget::new(cov, risk)?;
        let problem = Objective {
            mu,
            cov,
            target: target.target,
            penalty: self.vol_penalty,
        };
        let bounds = Bounds {
            lo: min_weight,
            hi: 1.0,
        };

        let mut w = equal_weights(n);
        let mut f = problem.value(&w);
        if !f.is_finite() {
            return Err(OptimizationError::NonFinite.into());
        }
        let mut step = 1.0_f64;

        for iter in 0..self.max_iterations {
            let g = problem.gradient(&w);
            if g.iter().any(|x| !x.is_finite()) {
                return Err(OptimizationError::NonFinite.into());
            }

            let unit = bounds.project(&axpy(-1.0, &g, &w));
            if max_abs_diff(&unit, &w) < self.tolerance {
                debug!("weight optimizer converged after {iter} iterations (objective {f:.6})");
                return Ok(finalize(unit, min_weight));
            }

            step = (step * 2.0).min(MAX_STEP);
            let mut accepted = None;
            for _ in 0..MAX_BACKTRACKS {
                let candidate = bounds.project(&axpy(-step, &g, &w));
                let fc = problem.value(&candidate);
                let decrease: f64 = g.iter().zip(&candidate).zip(&w).map(|((gi, c), wi)| gi * (c - wi)).sum();
                if fc.is_finite() && fc <= f + ARMIJO_C * decrease {
                    accepted = Some((candidate, fc));
                    break;
                }
                step *= 0.5;
            }

            match accepted {
                Some((candidate, fc)) if fc >= f || max_abs_diff(&candidate, &w) < self.tolerance => {
                    // Accepted step made no progress: the iterate is stationary at working precision.
                    debug!("weight optimizer settled after {iter} iterations (objective {fc:.6})");
                    return Ok(finalize(candidate, min_weight));
                }
                Some((candidate, fc)) => {
                    w = candidate;
                    f = fc;
                }
                None => {
                    // No descent possible at machine precision.
                    debug!("weight optimizer stalled at iteration {iter} (objective {f:.6})");
                    return Ok(finalize(w, min_weight));
                }
            }
        }

        Err(OptimizationError::NotConverged {
            iterations: self.max_iterations,
        }
        .into())
    }
}

// ---------------------------------------------------------------------------
// Volatility target
// ---------------------------------------------------------------------------

/// Volatility band of a covariance matrix and the point chosen within it.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VolatilityTarget {
    /// Volatility of the global-minimum-variance portfolio.
    pub min_vol: f64,
    /// Largest single-asset volatility.
    pub max_vol: f64,
    /// `min_vol + ρ · (max_vol − min_vol)`.
    pub target: f64,
}

impl VolatilityTarget {
    pub fn new(cov: &DMatrix<f64>, risk: RiskTolerance) -> Result<Self> {
        let max_vol = cov
            .diagonal()
            .iter()
            .map(|v| v.max(0.0).sqrt())
            .fold(0.0_f64, f64::max);
        if max_vol <= VOL_FLOOR {
            return Err(DataError::DegenerateCovariance.into());
        }

        let gmv = gmv_weights(cov)?;
        let min_vol = quad_form(cov, &gmv).max(0.0).sqrt();
        let target = min_vol + risk.value() * (max_vol - min_vol);
        if !(target.is_finite() && target > VOL_FLOOR) {
            return Err(DataError::DegenerateCovariance.into());
        }
        Ok(Self {
            min_vol,
            max_vol,
            target,
        })
    }
}

/// Global-minimum-variance weights `Σ⁺1 / (1ᵀΣ⁺1)`.
///
/// Weights may be negative; they are only used to locate the low end of the
/// volatility band.
pub fn gmv_weights(cov: &DMatrix<f64>) -> Result<Vec<f64>> {
    let n = cov.nrows();
    if n == 0 || cov.ncols() != n {
        return Err(DataError::DimensionMismatch {
            what: "covariance",
            expected: n,
            got: cov.ncols(),
        }
        .into());
    }
    let pinv = cov
        .clone()
        .pseudo_inverse(PINV_EPS)
        .map_err(|_| DataError::SingularCovariance)?;
    let x = pinv * DVector::from_element(n, 1.0);
    let denom = x.sum();
    if !denom.is_finite() || denom.abs() < 1e-15 {
        return Err(DataError::SingularCovariance.into());
    }
    Ok(x.iter().map(|xi| xi / denom).collect())
}

// ---------------------------------------------------------------------------
// Objective and projection
// ---------------------------------------------------------------------------

struct Objective<'a> {
    mu: &'a [f64],
    cov: &'a DMatrix<f64>,
    target: f64,
    penalty: f64,
}

impl Objective<'_> {
    /// `−ret/vol + c · ((vol − t)/t)²`
    fn value(&self, w: &[f64]) -> f64 {
        let ret = dot(w, self.mu);
        let vol = quad_form(self.cov, w).max(0.0).sqrt().max(VOL_FLOOR);
        let dev = (vol - self.target) / self.target;
        -ret / vol + self.penalty * dev * dev
    }

    fn gradient(&self, w: &[f64]) -> Vec<f64> {
        let sigma_w = mat_vec_mul(self.cov, w);
        let ret = dot(w, self.mu);
        let vol = dot(w, &sigma_w).max(0.0).sqrt().max(VOL_FLOOR);
        let vol3 = vol * vol * vol;
        let pen = 2.0 * self.penalty * (vol - self.target) / (self.target * self.target);

        self.mu
            .iter()
            .zip(&sigma_w)
            .map(|(m, sw)| -(m / vol - ret * sw / vol3) + pen * sw / vol)
            .collect()
    }
}

struct Bounds {
    lo: f64,
    hi: f64,
}

impl Bounds {
    /// Euclidean projection onto `{Σw = 1, lo ≤ w ≤ hi}`.
    fn project(&self, v: &[f64]) -> Vec<f64> {
        let total = |theta: f64| -> f64 { v.iter().map(|x| (x - theta).clamp(self.lo, self.hi)).sum() };

        let max_v = v.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min_v = v.iter().copied().fold(f64::INFINITY, f64::min);
        // total(a) >= 1 and total(b) <= 1.
        let mut a = min_v - self.hi;
        let mut b = max_v - self.lo;

        for _ in 0..BISECTION_ITERS {
            let mid = 0.5 * (a + b);
            if total(mid) > 1.0 {
                a = mid;
            } else {
                b = mid;
            }
            if b - a < 1e-15 {
                break;
            }
        }

        let theta = 0.5 * (a + b);
        v.iter().map(|x| (x - theta).clamp(self.lo, self.hi)).collect()
    }
}

/// Remove bisection residue while respecting the floor.
fn finalize(mut w: Vec<f64>, min_weight: f64) -> Vec<f64> {
    for x in &mut w {
        if !x.is_finite() || *x < min_weight {
            *x = min_weight;
        }
    }
    let sum: f64 = w.iter().sum();
    let excess = sum - 1.0;
    if excess.abs() > 0.0 {
        // Spread the residue over assets with room above the floor.
        let slack: f64 = w.iter().map(|x| x - min_weight).sum();
        if slack > 0.0 {
            for x in &mut w {
                *x -= excess * (*x - min_weight) / slack;
            }
        }
    }
    w
}

// ---------------------------------------------------------------------------
// Linear-algebra helpers
// ---------------------------------------------------------------------------

fn mat_vec_mul(matrix: &DMatrix<f64>, vec: &[f64]) -> Vec<f64> {
    (0..matrix.nrows())
        .map(|i| matrix.row(i).iter().zip(vec).map(|(a, b)| a * b).sum::<f64>())
        .collect()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub(crate) fn quad_form(matrix: &DMatrix<f64>, w: &[f64]) -> f64 {
    dot(w, &mat_vec_mul(matrix, w))
}

fn axpy(alpha: f64, x: &[f64], y: &[f64]) -> Vec<f64> {
    x.iter().zip(y).map(|(xi, yi)| yi + alpha * xi).collect()
}

fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).fold(0.0, f64::max)
}

pub(crate) fn equal_weights(n: usize) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    vec![1.0 / n as f64; n]
}
