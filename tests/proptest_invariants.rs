//! Property-based tests for engine invariants.
//!
//! These tests use proptest to check that weight, blending, selection and
//! tail-risk invariants hold across randomly generated universes.

use nalgebra::DMatrix;
use proptest::prelude::*;
use quantfolio::analysis::{VarConfig, blended_stats, monte_carlo_var};
use quantfolio::simulation::simulate;
use quantfolio::{
    Error, LocalSearchSolver, MarketEstimates, OptimizationError, QuboSelector, RiskTolerance, Selector,
    SimulationConfig, WeightOptimizer,
};

/// Random positive-definite covariance `AAᵀ + εI` with `n` assets.
fn covariance_strategy(n: usize) -> impl Strategy<Value = DMatrix<f64>> {
    prop::collection::vec(-0.3f64..0.3, n * n).prop_map(move |entries| {
        let a = DMatrix::from_row_slice(n, n, &entries);
        &a * a.transpose() + DMatrix::identity(n, n) * 0.005
    })
}

/// Expected returns, covariance and normalised weights over `2..=max_n` assets.
fn universe_strategy(max_n: usize) -> impl Strategy<Value = (Vec<f64>, DMatrix<f64>, Vec<f64>)> {
    (2..=max_n).prop_flat_map(|n| {
        (
            prop::collection::vec(-0.10f64..0.30, n),
            covariance_strategy(n),
            prop::collection::vec(0.01f64..1.0, n),
        )
            .prop_map(|(mu, cov, raw)| {
                let total: f64 = raw.iter().sum();
                let w = raw.iter().map(|x| x / total).collect();
                (mu, cov, w)
            })
    })
}

fn risk_strategy() -> impl Strategy<Value = RiskTolerance> {
    (0u32..=100).prop_map(|p| RiskTolerance::new(p as f64 / 100.0).unwrap())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // ========================================================================
    // WEIGHT INVARIANTS
    // ========================================================================

    /// Optimized weights sum to one and respect the floor.
    #[test]
    fn weights_sum_to_one_and_respect_floor(
        (mu, cov, _) in universe_strategy(6),
        risk in risk_strategy(),
        floor_frac in 0.0f64..1.0,
    ) {
        let n = mu.len();
        let min_weight = floor_frac / n as f64;
        match WeightOptimizer::default().optimize_raw(&mu, &cov, risk, min_weight) {
            Ok(w) => {
                prop_assert_eq!(w.len(), n);
                let total: f64 = w.iter().sum();
                prop_assert!((total - 1.0).abs() < 1e-6, "sum = {}", total);
                for wi in &w {
                    prop_assert!(wi.is_finite());
                    prop_assert!(*wi >= min_weight - 1e-9, "w = {} < floor {}", wi, min_weight);
                }
            }
            Err(Error::Optimization(OptimizationError::NotConverged { .. })) => {}
            Err(e) => prop_assert!(false, "unexpected error: {}", e),
        }
    }

    /// A floor that cannot be met by every asset is rejected.
    #[test]
    fn infeasible_floor_is_rejected(
        (mu, cov, _) in universe_strategy(5),
        excess in 0.01f64..0.5,
    ) {
        let min_weight = (1.0 + excess) / mu.len() as f64;
        let err = WeightOptimizer::default()
            .optimize_raw(&mu, &cov, RiskTolerance::new(0.5).unwrap(), min_weight)
            .unwrap_err();
        let is_infeasible = matches!(err, Error::Optimization(OptimizationError::InfeasibleFloor { .. }));
        prop_assert!(is_infeasible);
    }

    // ========================================================================
    // BLENDING INVARIANTS
    // ========================================================================

    /// Blended volatility is non-decreasing in risk tolerance.
    #[test]
    fn blended_volatility_is_monotone(
        (mu, cov, w) in universe_strategy(6),
        a in 0u32..=100,
        b in 0u32..=100,
        rf in 0.0f64..0.06,
    ) {
        let (lo, hi) = (a.min(b) as f64 / 100.0, a.max(b) as f64 / 100.0);
        let low = blended_stats(&w, &mu, &cov, RiskTolerance::new(lo).unwrap(), rf).unwrap();
        let high = blended_stats(&w, &mu, &cov, RiskTolerance::new(hi).unwrap(), rf).unwrap();
        prop_assert!(low.volatility <= high.volatility + 1e-15);
        prop_assert!(low.volatility >= 0.0);
        prop_assert!(low.sharpe.is_finite() && high.sharpe.is_finite());
    }

    // ========================================================================
    // SELECTION INVARIANTS
    // ========================================================================

    /// Every returned selection has exactly k distinct assets.
    #[test]
    fn selection_has_exactly_k_assets(
        (mu, cov, _) in universe_strategy(10),
        risk in risk_strategy(),
        k_frac in 0.0f64..1.0,
    ) {
        let n = mu.len();
        let k = 1 + (k_frac * (n - 1) as f64) as usize;
        let symbols = (0..n).map(|i| format!("A{i}")).collect();
        let estimates = MarketEstimates::new(symbols, mu, cov).unwrap();
        let selection = QuboSelector::new(LocalSearchSolver::default())
            .select(&estimates, k, risk)
            .unwrap();
        prop_assert_eq!(selection.len(), k);
        prop_assert!(selection.indices().windows(2).all(|p| p[0] < p[1]));
        prop_assert!(!selection.is_best_effort());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    // ========================================================================
    // TAIL INVARIANTS
    // ========================================================================

    /// Final-value percentiles and simulated tail losses are ordered.
    #[test]
    fn simulated_percentiles_and_tails_are_ordered(
        (mu, cov, w) in universe_strategy(4),
        seed in any::<u64>(),
    ) {
        let cfg = SimulationConfig {
            horizon_days: 21,
            simulations: 200,
            sample_paths: 2,
            seed,
            ..SimulationConfig::default()
        };
        let result = simulate(&w, &mu, &cov, 10_000.0, &cfg).unwrap();

        for pair in result.final_percentiles.windows(2) {
            prop_assert!(pair[0].value <= pair[1].value);
        }
        for band in result.bands.windows(2) {
            for (lo, hi) in band[0].values.iter().zip(&band[1].values) {
                prop_assert!(lo <= hi);
            }
        }
        for t in &result.tail {
            prop_assert!(t.cvar >= t.var, "cvar {} < var {}", t.cvar, t.var);
        }
        prop_assert!(result.max_drawdown.summary.min >= 0.0);
        prop_assert!(result.max_drawdown.summary.max <= 1.0);
    }

    /// Monte Carlo CVaR loss is never below VaR loss.
    #[test]
    fn monte_carlo_cvar_exceeds_var(
        (mu, cov, w) in universe_strategy(5),
        seed in any::<u64>(),
        alpha in 0.01f64..0.2,
    ) {
        let cfg = VarConfig { horizon_days: 21, simulations: 500, alpha, seed };
        let tail = monte_carlo_var(&w, &mu, &cov, &cfg).unwrap();
        prop_assert!(tail.cvar_loss >= tail.var_loss);
        prop_assert!(tail.cvar_return <= tail.var_return);
        prop_assert_eq!(tail.samples.len(), 500);
    }
}
