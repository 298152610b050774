//! # quantfolio
//!
//! A portfolio construction and risk-simulation engine.
//!
//! Given a universe of assets with annualised expected returns and a
//! covariance matrix, the engine:
//!
//! 1. **selects** a cardinality-constrained subset ([`selection`]),
//! 2. **weights** it under a floor and a volatility target ([`optimize`]),
//! 3. **analyses** the blended cash + risky portfolio ([`analysis`]),
//! 4. **projects** its value over a horizon ([`projection`]),
//! 5. **simulates** multi-path outcomes with drawdown tracking ([`simulation`]).
//!
//! Every component is a pure function over its inputs. Failures are typed
//! ([`Error`]) and NaN/Inf never escape.
//!
//! ## Quick Start
//!
//! ```
//! use nalgebra::DMatrix;
//! use quantfolio::{EngineConfig, ExhaustiveSolver, MarketEstimates, NoBetas, PortfolioRequest, optimize_portfolio};
//!
//! let estimates = MarketEstimates::new(
//!     vec!["A".into(), "B".into(), "C".into(), "D".into()],
//!     vec![0.08, 0.10, 0.05, 0.12],
//!     DMatrix::identity(4, 4) * 0.04,
//! )?;
//! let request = PortfolioRequest {
//!     risk: 0.5,
//!     amount: 100_000.0,
//!     horizon_years: 5,
//!     num_assets: 2,
//! };
//!
//! let config = EngineConfig::default();
//! let selector = config.qubo_selector(ExhaustiveSolver::default());
//! let outcome = optimize_portfolio(&request, &estimates, &selector, &NoBetas, None, &config)?;
//!
//! assert_eq!(outcome.selection.len(), 2);
//! assert!((outcome.weights.values().iter().sum::<f64>() - 1.0).abs() < 1e-6);
//! # Ok::<(), quantfolio::Error>(())
//! ```
//!
//! ## Two-fund blending
//!
//! Risk tolerance `ρ` mixes the risky sub-portfolio with cash:
//! `E[r] = (1−ρ)·rf + ρ·E[r_risky]` and `vol = ρ·vol_risky`.
//!
//! ```
//! use nalgebra::DMatrix;
//! use quantfolio::{RiskTolerance, analysis::blended_stats};
//!
//! let cov = DMatrix::from_row_slice(2, 2, &[0.04, 0.0, 0.0, 0.09]);
//! let cash = blended_stats(&[0.5, 0.5], &[0.10, 0.20], &cov, RiskTolerance::CONSERVATIVE, 0.02)?;
//! assert_eq!(cash.volatility, 0.0);
//! assert!((cash.expected_return - 0.02).abs() < 1e-12);
//! # Ok::<(), quantfolio::Error>(())
//! ```
//!
//! ## Features
//!
//! - `parallel` (default): Monte Carlo paths run on a rayon pool.
//! - `serde`: `Serialize`/`Deserialize` on requests and results.

pub mod analysis;
mod error;
pub mod estimates;
pub mod mvn;
pub mod optimize;
pub mod pipeline;
pub mod projection;
mod request;
pub mod selection;
pub mod simulation;
pub mod stats;
mod types;

pub use analysis::{BlendedStats, MetricsBundle, RiskReturnAnalyzer, TailRisk, VarConfig};
pub use error::{DataError, Error, OptimizationError, Result, SelectionError, SimulationError};
pub use estimates::{MarketEstimates, ReturnMatrix};
pub use optimize::{VolatilityTarget, WeightOptimizer};
pub use pipeline::{
    Comparison, EngineConfig, FallbackPolicy, OptimizationOutcome, WeightSource, compare_with_baseline,
    optimize_portfolio, simulate_outcome,
};
pub use projection::{AllocationRow, BetaLookup, NoBetas, Projection};
pub use request::{MAX_HORIZON_YEARS, PortfolioRequest};
pub use selection::{
    BaselineSelector, CombinatorialSolver, ExhaustiveSolver, LocalSearchSolver, QuboSelector, SelectionProblem,
    Selector, UndersizedUniversePolicy,
};
pub use simulation::{SimulationConfig, SimulationResult};
pub use types::{RiskTolerance, Selection, TRADING_DAYS, WEIGHT_SUM_TOLERANCE, Weights};
