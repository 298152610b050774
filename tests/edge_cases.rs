//! Edge case tests: boundary inputs and the typed errors they produce.

use chrono::NaiveDate;
use nalgebra::DMatrix;
use quantfolio::optimize::VolatilityTarget;
use quantfolio::{
    BaselineSelector, DataError, EngineConfig, Error, ExhaustiveSolver, LocalSearchSolver, MarketEstimates, NoBetas,
    OptimizationError, PortfolioRequest, QuboSelector, ReturnMatrix, RiskTolerance, SelectionError, Selector,
    SimulationConfig, SimulationError, UndersizedUniversePolicy, WeightOptimizer, WeightSource, optimize_portfolio,
};

fn universe(n: usize) -> MarketEstimates {
    let symbols = (0..n).map(|i| format!("A{i}")).collect();
    let mu = (0..n).map(|i| 0.04 + 0.01 * i as f64).collect();
    MarketEstimates::new(symbols, mu, DMatrix::identity(n, n) * 0.04).unwrap()
}

// ============================================================================
// Selection
// ============================================================================

#[test]
fn k_larger_than_universe_is_rejected_by_default() {
    let est = universe(3);
    for selector in [
        Box::new(QuboSelector::new(ExhaustiveSolver::default())) as Box<dyn Selector>,
        Box::new(BaselineSelector::new()),
    ] {
        let err = selector.select(&est, 5, RiskTolerance::new(0.5).unwrap()).unwrap_err();
        assert_eq!(
            err,
            Error::Selection(SelectionError::UniverseTooSmall { universe: 3, k: 5 }),
            "{}",
            selector.name()
        );
    }
}

#[test]
fn take_all_policy_returns_best_effort_universe() {
    let est = universe(3);
    let selector = QuboSelector::new(LocalSearchSolver::default()).with_policy(UndersizedUniversePolicy::TakeAll);
    let sel = selector.select(&est, 5, RiskTolerance::AGGRESSIVE).unwrap();
    assert_eq!(sel.len(), 3);
    assert!(sel.is_best_effort());
}

#[test]
fn zero_assets_requested() {
    let err = QuboSelector::new(ExhaustiveSolver::default())
        .select(&universe(3), 0, RiskTolerance::AGGRESSIVE)
        .unwrap_err();
    assert_eq!(err, Error::Selection(SelectionError::ZeroAssets));
}

#[test]
fn k_equal_to_universe_selects_everything() {
    let sel = QuboSelector::new(ExhaustiveSolver::default())
        .select(&universe(4), 4, RiskTolerance::new(0.3).unwrap())
        .unwrap();
    assert_eq!(sel.indices(), &[0, 1, 2, 3]);
    assert!(!sel.is_best_effort());
}

#[test]
fn exhaustive_solver_refuses_huge_enumerations() {
    let err = QuboSelector::new(ExhaustiveSolver::default())
        .select(&universe(60), 10, RiskTolerance::new(0.5).unwrap())
        .unwrap_err();
    assert!(matches!(err, Error::Selection(SelectionError::Solver(_))));
}

// ============================================================================
// Weights
// ============================================================================

#[test]
fn single_asset_gets_full_weight() {
    let w = WeightOptimizer::default()
        .optimize_raw(&[0.07], &DMatrix::from_element(1, 1, 0.04), RiskTolerance::new(0.4).unwrap(), 0.01)
        .unwrap();
    assert_eq!(w, vec![1.0]);
}

#[test]
fn floor_of_exactly_one_over_k_forces_equal_weights() {
    let w = WeightOptimizer::default()
        .optimize_raw(&[0.05, 0.20], &(DMatrix::identity(2, 2) * 0.04), RiskTolerance::AGGRESSIVE, 0.5)
        .unwrap();
    assert!((w[0] - 0.5).abs() < 1e-9);
    assert!((w[1] - 0.5).abs() < 1e-9);
}

#[test]
fn zero_covariance_has_no_volatility_target() {
    let err = VolatilityTarget::new(&DMatrix::zeros(3, 3), RiskTolerance::new(0.5).unwrap()).unwrap_err();
    assert_eq!(err, Error::Data(DataError::DegenerateCovariance));

    let err = WeightOptimizer::default()
        .optimize_raw(&[0.1, 0.2, 0.3], &DMatrix::zeros(3, 3), RiskTolerance::new(0.5).unwrap(), 0.0)
        .unwrap_err();
    assert_eq!(err, Error::Data(DataError::DegenerateCovariance));
}

#[test]
fn iteration_cap_reports_not_converged() {
    let optimizer = WeightOptimizer {
        max_iterations: 1,
        ..WeightOptimizer::default()
    };
    let cov = DMatrix::from_row_slice(3, 3, &[0.04, 0.01, 0.0, 0.01, 0.09, 0.02, 0.0, 0.02, 0.16]);
    let err = optimizer
        .optimize_raw(&[0.05, 0.10, 0.20], &cov, RiskTolerance::new(0.7).unwrap(), 0.0)
        .unwrap_err();
    assert_eq!(
        err,
        Error::Optimization(OptimizationError::NotConverged { iterations: 1 })
    );
}

#[test]
fn not_converged_falls_back_in_pipeline() {
    let config = EngineConfig {
        optimizer: WeightOptimizer {
            max_iterations: 1,
            ..WeightOptimizer::default()
        },
        ..EngineConfig::default()
    };
    let est = MarketEstimates::new(
        vec!["A".into(), "B".into(), "C".into()],
        vec![0.05, 0.10, 0.20],
        DMatrix::from_row_slice(3, 3, &[0.04, 0.01, 0.0, 0.01, 0.09, 0.02, 0.0, 0.02, 0.16]),
    )
    .unwrap();
    let request = PortfolioRequest {
        risk: 0.7,
        amount: 1_000.0,
        horizon_years: 1,
        num_assets: 3,
    };
    let out = optimize_portfolio(
        &request,
        &est,
        &config.qubo_selector(ExhaustiveSolver::default()),
        &NoBetas,
        None,
        &config,
    )
    .unwrap();
    match out.weight_source {
        WeightSource::EqualWeightFallback { reason } => assert!(reason.contains("converge")),
        other => panic!("expected fallback, got {other:?}"),
    }
}

// ============================================================================
// Data
// ============================================================================

#[test]
fn negative_variance_is_rejected() {
    let err = MarketEstimates::new(
        vec!["A".into(), "B".into()],
        vec![0.1, 0.1],
        DMatrix::from_row_slice(2, 2, &[-0.01, 0.0, 0.0, 0.04]),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Data(DataError::NotPositiveSemiDefinite { .. })));
}

#[test]
fn non_finite_estimates_are_rejected() {
    let err = MarketEstimates::new(vec!["A".into()], vec![f64::NAN], DMatrix::from_element(1, 1, 0.04)).unwrap_err();
    assert_eq!(err, Error::Data(DataError::NonFinite("expected returns")));

    let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    let err = ReturnMatrix::new(
        vec![day, day.succ_opt().unwrap()],
        vec!["A".into()],
        vec![vec![0.01], vec![f64::INFINITY]],
    )
    .unwrap_err();
    assert_eq!(err, Error::Data(DataError::NonFinite("return matrix")));
}

#[test]
fn unknown_symbol_in_weights() {
    let est = universe(2);
    let sel = BaselineSelector::new().select(&est, 2, RiskTolerance::AGGRESSIVE).unwrap();
    let w = WeightOptimizer::default().optimize(&sel, &est, RiskTolerance::AGGRESSIVE, 0.0).unwrap();
    let err = quantfolio::simulation::simulate_weights(&w, &universe(1), 100.0, &SimulationConfig::default())
        .unwrap_err();
    assert!(matches!(err, Error::Data(DataError::UnknownSymbol(_))));
}

// ============================================================================
// Request and simulation bounds
// ============================================================================

#[test]
fn request_bounds() {
    let ok = PortfolioRequest {
        risk: 1.0,
        amount: 0.01,
        horizon_years: quantfolio::MAX_HORIZON_YEARS,
        num_assets: 1,
    };
    assert!(ok.validate().is_ok());
    assert!(
        PortfolioRequest {
            risk: -0.01,
            ..ok.clone()
        }
        .validate()
        .is_err()
    );
    assert!(
        PortfolioRequest {
            risk: f64::NAN,
            ..ok
        }
        .validate()
        .is_err()
    );
}

#[test]
fn one_day_one_path_simulation() {
    let cfg = SimulationConfig {
        horizon_days: 1,
        simulations: 1,
        ..SimulationConfig::default()
    };
    let r = quantfolio::simulation::simulate(&[1.0], &[0.1], &DMatrix::from_element(1, 1, 0.04), 500.0, &cfg).unwrap();
    assert_eq!(r.final_values.len(), 1);
    assert_eq!(r.time_points, vec![0, 1]);
    assert_eq!(r.sample_paths.len(), 1);
    assert_eq!(r.final_value.std, 0.0);
}

#[test]
fn negative_investment_is_rejected() {
    let err = quantfolio::simulation::simulate(
        &[1.0],
        &[0.1],
        &DMatrix::from_element(1, 1, 0.04),
        -5.0,
        &SimulationConfig::default(),
    )
    .unwrap_err();
    assert_eq!(err, Error::Simulation(SimulationError::InvalidInvestment(-5.0)));
}
