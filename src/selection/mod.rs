//! Cardinality-constrained asset selection.
//!
//! A [`Selector`] picks `k` symbols from the universe described by a
//! [`MarketEstimates`]. Two strategies are provided:
//!
//! - [`QuboSelector`]: builds a [`SelectionProblem`] (linear reward plus
//!   quadratic risk penalty over binary variables, exactly `k` ones) and
//!   hands it to a pluggable [`CombinatorialSolver`].
//! - [`BaselineSelector`]: a deterministic, deliberately weak reference that
//!   picks a window of low-Sharpe assets. Used for comparison reports only.

mod baseline;
mod optimizing;
mod solver;

pub use baseline::{BaselineComparison, BaselineSelector, baseline_comparison};
pub use optimizing::QuboSelector;
pub use solver::{CombinatorialSolver, ExhaustiveSolver, LocalSearchSolver};

use log::warn;
use nalgebra::DMatrix;

use crate::error::{DataError, Result, SelectionError};
use crate::estimates::MarketEstimates;
use crate::types::{RiskTolerance, Selection};

/// Strategy contract for choosing `k` assets.
pub trait Selector {
    /// Select `k` symbols from `estimates`' universe.
    fn select(&self, estimates: &MarketEstimates, k: usize, risk: RiskTolerance) -> Result<Selection>;

    /// Short strategy name for logs and reports.
    fn name(&self) -> &'static str;
}

/// What to do when fewer than `k` assets are available.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum UndersizedUniversePolicy {
    /// Fail with [`SelectionError::UniverseTooSmall`].
    #[default]
    Reject,
    /// Return the whole universe flagged as best-effort.
    TakeAll,
}

impl UndersizedUniversePolicy {
    /// Handle the trivial cases shared by every selector.
    ///
    /// Returns `Some` when the answer does not depend on the strategy.
    pub(crate) fn resolve(self, universe: &[String], k: usize) -> Result<Option<Selection>> {
        if k == 0 {
            return Err(SelectionError::ZeroAssets.into());
        }
        let n = universe.len();
        if n == 0 {
            return Err(DataError::Empty("universe").into());
        }
        if k < n {
            return Ok(None);
        }
        if k == n {
            return Ok(Some(Selection::from_indices(universe, (0..n).collect(), false)));
        }
        match self {
            Self::Reject => Err(SelectionError::UniverseTooSmall { universe: n, k }.into()),
            Self::TakeAll => {
                warn!("universe has {n} assets but {k} were requested; taking all");
                Ok(Some(Selection::from_indices(universe, (0..n).collect(), true)))
            }
        }
    }
}

/// Binary quadratic selection problem:
/// minimise `Σ linearᵢ xᵢ + Σ quadraticᵢⱼ xᵢ xⱼ` with `Σ xᵢ = k`.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectionProblem {
    pub linear: Vec<f64>,
    pub quadratic: DMatrix<f64>,
    pub k: usize,
}

impl SelectionProblem {
    /// Build the reward/risk objective for `estimates` at risk tolerance `risk`.
    ///
    /// `λ = 0.1 + 9.9·(1−ρ)²` scales `Σ`; expected returns are divided by the
    /// universe's average volatility so both terms share a scale.
    pub fn from_estimates(estimates: &MarketEstimates, k: usize, risk: RiskTolerance) -> Self {
        let lambda = risk_aversion(risk);
        let cov = estimates.covariance();
        let n = cov.nrows();

        let mean_var = if n == 0 { 0.0 } else { cov.diagonal().sum() / n as f64 };
        let avg_vol = mean_var.max(0.0).sqrt();
        let scale = if avg_vol > 0.0 { avg_vol } else { 1.0 };

        Self {
            linear: estimates.expected_returns().iter().map(|m| -m / scale).collect(),
            quadratic: cov * lambda,
            k,
        }
    }

    pub fn len(&self) -> usize {
        self.linear.len()
    }

    pub fn is_empty(&self) -> bool {
        self.linear.is_empty()
    }

    /// Objective value of a 0/1 assignment.
    pub fn objective(&self, x: &[u8]) -> f64 {
        let on: Vec<usize> = x.iter().enumerate().filter(|(_, v)| **v > 0).map(|(i, _)| i).collect();
        self.subset_objective(&on)
    }

    /// Objective value of the subset given by indices.
    pub fn subset_objective(&self, indices: &[usize]) -> f64 {
        let mut total: f64 = indices.iter().map(|&i| self.linear[i]).sum();
        for &i in indices {
            for &j in indices {
                total += self.quadratic[(i, j)];
            }
        }
        total
    }

    /// Turn a solver's 0/1 vector into a selection over `universe`.
    pub fn decode(&self, x: &[u8], universe: &[String]) -> Result<Selection> {
        if x.len() != self.len() || universe.len() != self.len() {
            return Err(SelectionError::InfeasibleSolution(format!(
                "expected {} variables, got {}",
                self.len(),
                x.len()
            ))
            .into());
        }
        let chosen: Vec<usize> = x.iter().enumerate().filter(|(_, v)| **v > 0).map(|(i, _)| i).collect();
        if chosen.len() != self.k {
            return Err(SelectionError::InfeasibleSolution(format!(
                "expected {} assets, solver picked {}",
                self.k,
                chosen.len()
            ))
            .into());
        }
        Ok(Selection::from_indices(universe, chosen, false))
    }
}

/// Variance-penalty multiplier for a risk tolerance.
pub fn risk_aversion(risk: RiskTolerance) -> f64 {
    let c = 1.0 - risk.value();
    0.1 + c * c * 9.9
}
