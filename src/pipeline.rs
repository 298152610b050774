//! End-to-end orchestration: selection → weights → metrics ‖ projection.
//!
//! Every step is a pure function of its inputs. The only policy decision
//! made here is what to do when the weight optimizer fails, and that is
//! always reported back through [`WeightSource`].

use log::{info, warn};

use crate::analysis::{MetricsBundle, RiskReturnAnalyzer, VarConfig};
use crate::error::{DataError, Error, Result};
use crate::estimates::{MarketEstimates, ReturnMatrix};
use crate::optimize::WeightOptimizer;
use crate::projection::{AllocationRow, BetaLookup, Projection, allocation_table, project};
use crate::request::PortfolioRequest;
use crate::selection::{
    BaselineComparison, BaselineSelector, CombinatorialSolver, QuboSelector, Selector, UndersizedUniversePolicy,
    baseline_comparison,
};
use crate::simulation::{SimulationConfig, SimulationResult, simulate_weights};
use crate::types::{Selection, Weights};

/// What to do when the weight optimizer fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FallbackPolicy {
    /// Use equal weights and record why.
    #[default]
    EqualWeights,
    /// Return the optimizer error.
    Propagate,
}

/// Engine-wide settings.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineConfig {
    /// Annual risk-free rate.
    pub risk_free: f64,
    /// Floor on every selected asset's weight.
    pub min_weight: f64,
    pub fallback: FallbackPolicy,
    pub undersized: UndersizedUniversePolicy,
    pub optimizer: WeightOptimizer,
    pub var: VarConfig,
    /// Seed of the baseline comparison weight search.
    pub baseline_seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            risk_free: 0.02,
            min_weight: 0.01,
            fallback: FallbackPolicy::default(),
            undersized: UndersizedUniversePolicy::default(),
            optimizer: WeightOptimizer::default(),
            var: VarConfig::default(),
            baseline_seed: 42,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.risk_free.is_finite() || !(-1.0..=1.0).contains(&self.risk_free) {
            return Err(DataError::OutOfRange {
                field: "risk_free",
                value: self.risk_free,
                range: "[-1, 1]",
            }
            .into());
        }
        if !(0.0..=1.0).contains(&self.min_weight) {
            return Err(DataError::OutOfRange {
                field: "min_weight",
                value: self.min_weight,
                range: "[0, 1]",
            }
            .into());
        }
        self.optimizer.validate()?;
        self.var.validate()
    }

    /// Optimizing selector honouring the configured undersized-universe policy.
    pub fn qubo_selector<S: CombinatorialSolver>(&self, solver: S) -> QuboSelector<S> {
        QuboSelector::new(solver).with_policy(self.undersized)
    }

    /// Baseline selector honouring the configured undersized-universe policy.
    pub fn baseline_selector(&self) -> BaselineSelector {
        BaselineSelector::new().with_policy(self.undersized)
    }

    fn analyzer(&self) -> RiskReturnAnalyzer {
        RiskReturnAnalyzer::new(self.risk_free, self.var)
    }
}

/// Where the final weights came from.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum WeightSource {
    Optimized,
    EqualWeightFallback { reason: String },
}

/// Result of one optimisation request.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OptimizationOutcome {
    pub request: PortfolioRequest,
    pub strategy: String,
    pub selection: Selection,
    pub weights: Weights,
    pub weight_source: WeightSource,
    pub metrics: MetricsBundle,
    pub projection: Projection,
    pub allocation: Vec<AllocationRow>,
}

#[cfg(feature = "parallel")]
fn join<A, B, RA, RB>(a: A, b: B) -> (RA, RB)
where
    A: FnOnce() -> RA + Send,
    B: FnOnce() -> RB + Send,
    RA: Send,
    RB: Send,
{
    rayon::join(a, b)
}

#[cfg(not(feature = "parallel"))]
fn join<A, B, RA, RB>(a: A, b: B) -> (RA, RB)
where
    A: FnOnce() -> RA,
    B: FnOnce() -> RB,
{
    (a(), b())
}

fn weights_for(
    selection: &Selection,
    estimates: &MarketEstimates,
    request: &PortfolioRequest,
    config: &EngineConfig,
) -> Result<(Weights, WeightSource)> {
    let risk = request.risk_tolerance()?;
    match config.optimizer.optimize(selection, estimates, risk, config.min_weight) {
        Ok(w) => Ok((w, WeightSource::Optimized)),
        Err(Error::Optimization(e)) if config.fallback == FallbackPolicy::EqualWeights => {
            warn!("weight optimization failed ({e}); falling back to equal weights");
            let w = Weights::equal(selection.symbols().to_vec())?;
            Ok((w, WeightSource::EqualWeightFallback { reason: e.to_string() }))
        }
        Err(e) => Err(e),
    }
}

/// Select, weight, analyse and project a portfolio for `request`.
pub fn optimize_portfolio(
    request: &PortfolioRequest,
    estimates: &MarketEstimates,
    selector: &dyn Selector,
    betas: &dyn BetaLookup,
    history: Option<&ReturnMatrix>,
    config: &EngineConfig,
) -> Result<OptimizationOutcome> {
    request.validate()?;
    config.validate()?;
    let risk = request.risk_tolerance()?;

    let selection = selector.select(estimates, request.num_assets, risk)?;
    info!(
        "{} selector picked {} assets: {:?}",
        selector.name(),
        selection.len(),
        selection.symbols()
    );

    let (weights, weight_source) = weights_for(&selection, estimates, request, config)?;
    let analyzer = config.analyzer();

    let (metrics, projection) = join(
        || analyzer.analyze(&weights, estimates, risk, history),
        || {
            project(
                &weights,
                estimates,
                risk,
                request.amount,
                request.horizon_years,
                config.risk_free,
                betas,
            )
        },
    );
    let allocation = allocation_table(
        &weights,
        estimates,
        request.amount,
        request.horizon_years,
        config.risk_free,
    )?;

    Ok(OptimizationOutcome {
        request: request.clone(),
        strategy: selector.name().to_string(),
        selection,
        weights,
        weight_source,
        metrics: metrics?,
        projection: projection?,
        allocation,
    })
}

/// Run the path simulation over the outcome's weights for the request horizon.
pub fn simulate_outcome(
    outcome: &OptimizationOutcome,
    estimates: &MarketEstimates,
    config: &SimulationConfig,
) -> Result<SimulationResult> {
    let config = SimulationConfig {
        horizon_days: outcome.request.horizon_days(),
        ..config.clone()
    };
    simulate_weights(&outcome.weights, estimates, outcome.request.amount, &config)
}

/// Optimised portfolio next to the low-Sharpe reference.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Comparison {
    pub optimized: OptimizationOutcome,
    pub baseline: BaselineComparison,
    pub baseline_projection: Projection,
}

/// Optimise with `selector` and build the baseline reference for the same request.
pub fn compare_with_baseline(
    request: &PortfolioRequest,
    estimates: &MarketEstimates,
    selector: &dyn Selector,
    betas: &dyn BetaLookup,
    history: Option<&ReturnMatrix>,
    config: &EngineConfig,
) -> Result<Comparison> {
    let optimized = optimize_portfolio(request, estimates, selector, betas, history, config)?;
    let risk = request.risk_tolerance()?;

    let baseline_selection = config
        .baseline_selector()
        .select(estimates, request.num_assets, risk)?;
    let baseline = baseline_comparison(&baseline_selection, estimates, risk, config.baseline_seed)?;
    let baseline_projection = project(
        &baseline.weights,
        estimates,
        risk,
        request.amount,
        request.horizon_years,
        config.risk_free,
        betas,
    )?;

    Ok(Comparison {
        optimized,
        baseline,
        baseline_projection,
    })
}
