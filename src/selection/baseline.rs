//! Low-Sharpe reference strategy.
//!
//! Ranks the universe by Sharpe ratio ascending and takes a window of `k`
//! assets starting at `round(ρ·(n−k))`. The resulting portfolio is a
//! contrast for comparison reports and is never used as the default path.

use log::debug;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Dirichlet, Distribution};

use super::{Selector, UndersizedUniversePolicy};
use crate::error::{Result, SelectionError};
use crate::estimates::MarketEstimates;
use crate::optimize::quad_form;
use crate::types::{RiskTolerance, Selection, Weights};

/// Dirichlet draws searched for the minimum-volatility reference weights.
const SEARCH_DRAWS: usize = 20_000;
/// Share of equal weight blended into the searched weights.
const EQUAL_BLEND: f64 = 0.65;

/// Deterministic low-Sharpe window selector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BaselineSelector {
    policy: UndersizedUniversePolicy,
}

impl BaselineSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, policy: UndersizedUniversePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Universe indices ordered by Sharpe ratio ascending (ties by index).
    pub fn ranking(estimates: &MarketEstimates) -> Vec<usize> {
        let sharpe: Vec<f64> = estimates
            .expected_returns()
            .iter()
            .zip(estimates.volatilities())
            .map(|(m, v)| if v > 0.0 { m / v } else { 0.0 })
            .collect();
        let mut order: Vec<usize> = (0..sharpe.len()).collect();
        order.sort_by(|&a, &b| sharpe[a].total_cmp(&sharpe[b]).then(a.cmp(&b)));
        order
    }

    /// First ranking position of the window.
    pub fn window_start(n: usize, k: usize, risk: RiskTolerance) -> usize {
        let span = n.saturating_sub(k);
        ((risk.value() * span as f64).round() as usize).min(span)
    }
}

impl Selector for BaselineSelector {
    fn select(&self, estimates: &MarketEstimates, k: usize, risk: RiskTolerance) -> Result<Selection> {
        if let Some(trivial) = self.policy.resolve(estimates.symbols(), k)? {
            return Ok(trivial);
        }
        let ranking = Self::ranking(estimates);
        let start = Self::window_start(ranking.len(), k, risk);
        let window = ranking[start..start + k].to_vec();
        debug!("baseline window starts at rank {start} of {}", ranking.len());
        Ok(Selection::from_indices(estimates.symbols(), window, false))
    }

    fn name(&self) -> &'static str {
        "baseline"
    }
}

/// Weights and statistics of the reference portfolio.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BaselineComparison {
    pub selection: Selection,
    pub weights: Weights,
    pub expected_return: f64,
    pub volatility: f64,
    /// `expected_return / volatility`, 0 when volatility is 0.
    pub sharpe: f64,
}

/// Reference weights over `selection`: the lowest-volatility Dirichlet draw
/// meeting a damped return target, blended toward equal weight.
pub fn baseline_comparison(
    selection: &Selection,
    estimates: &MarketEstimates,
    risk: RiskTolerance,
    seed: u64,
) -> Result<BaselineComparison> {
    let sub = estimates.subset_by_symbols(selection.symbols())?;
    let mu = sub.expected_returns();
    let cov = sub.covariance();
    let n = mu.len();
    if n == 0 {
        return Err(SelectionError::ZeroAssets.into());
    }

    let target = mu.iter().sum::<f64>() / n as f64 * (0.3 + 0.7 * risk.value());
    let equal = vec![1.0 / n as f64; n];

    let searched = if n == 1 {
        vec![1.0]
    } else {
        let dirichlet = Dirichlet::new_with_size(1.0, n).map_err(|e| SelectionError::Solver(format!("{e:?}")))?;
        let mut rng = StdRng::seed_from_u64(seed);
        let mut best: Option<(Vec<f64>, f64)> = None;
        for _ in 0..SEARCH_DRAWS {
            let w: Vec<f64> = dirichlet.sample(&mut rng);
            let ret: f64 = w.iter().zip(mu).map(|(a, b)| a * b).sum();
            if ret < target {
                continue;
            }
            let vol = quad_form(cov, &w).max(0.0).sqrt();
            if best.as_ref().is_none_or(|(_, bv)| vol < *bv) {
                best = Some((w, vol));
            }
        }
        best.map_or_else(|| equal.clone(), |(w, _)| w)
    };

    let mut blended: Vec<f64> = searched
        .iter()
        .zip(&equal)
        .map(|(s, e)| ((1.0 - EQUAL_BLEND) * s + EQUAL_BLEND * e).max(0.0))
        .collect();
    let total: f64 = blended.iter().sum();
    for w in &mut blended {
        *w /= total;
    }

    let expected_return: f64 = blended.iter().zip(mu).map(|(a, b)| a * b).sum();
    let volatility = quad_form(cov, &blended).max(0.0).sqrt();
    let sharpe = if volatility > 1e-12 {
        expected_return / volatility
    } else {
        0.0
    };

    Ok(BaselineComparison {
        selection: selection.clone(),
        weights: Weights::new(selection.symbols().to_vec(), blended)?,
        expected_return,
        volatility,
        sharpe,
    })
}
