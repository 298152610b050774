//! Command workflows: load data → run the engine → journal the result.

use std::path::Path;
use std::sync::Arc;

use log::{info, warn};
use serde::Serialize;

use quantfolio::selection::SelectionProblem;
use quantfolio::stats::{self, AssetSummary};
use quantfolio::{
    BetaLookup, CombinatorialSolver, Comparison, ExhaustiveSolver, LocalSearchSolver, NoBetas, OptimizationOutcome,
    PortfolioRequest, SelectionError, SimulationResult, compare_with_baseline, optimize_portfolio, simulate_outcome,
};

use crate::config::{Config, SolverKind};
use crate::data::{self, Fundamentals, MarketData, MarketDataCache};
use crate::error::{Error, Result};
use crate::journal::{Event, Journal};

/// Load and validate a request file.
pub fn load_request(path: &Path) -> Result<PortfolioRequest> {
    let request: PortfolioRequest = data::read_json(path)?;
    request.validate()?;
    Ok(request)
}

/// Exhaustive search while the subset count fits under its cap, local
/// search beyond it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AutoSolver {
    pub exhaustive: ExhaustiveSolver,
    pub local: LocalSearchSolver,
}

impl CombinatorialSolver for AutoSolver {
    fn solve(&self, problem: &SelectionProblem) -> quantfolio::Result<Vec<u8>> {
        match self.exhaustive.solve(problem) {
            Err(quantfolio::Error::Selection(SelectionError::Solver(reason))) => {
                info!("{reason}; switching to local search");
                self.local.solve(problem)
            }
            other => other,
        }
    }

    fn name(&self) -> &'static str {
        "auto"
    }
}

/// Solver described by the `[engine]` section.
pub fn build_solver(config: &Config) -> Box<dyn CombinatorialSolver> {
    let exhaustive = ExhaustiveSolver {
        max_combinations: config.engine.max_combinations,
    };
    let local = LocalSearchSolver {
        restarts: config.engine.restarts,
        seed: config.engine.solver_seed,
        ..LocalSearchSolver::default()
    };
    match config.engine.solver {
        SolverKind::Auto => Box::new(AutoSolver { exhaustive, local }),
        SolverKind::Exhaustive => Box::new(exhaustive),
        SolverKind::LocalSearch => Box::new(local),
    }
}

/// Optimized portfolio plus its simulated paths.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub outcome: OptimizationOutcome,
    pub simulation: SimulationResult,
}

/// Historical tail of one asset's daily returns.
#[derive(Debug, Clone, Serialize)]
pub struct HistoricalTail {
    pub symbol: String,
    pub var: f64,
    pub cvar: f64,
}

/// Descriptive statistics of the configured universe.
#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    pub assets: Vec<AssetSummary>,
    /// Pairwise correlations, row-major in `assets` order; NaN for constant series.
    pub correlation: Vec<Vec<f64>>,
    pub alpha: f64,
    pub tails: Vec<HistoricalTail>,
    pub window: usize,
    /// Annualised Sharpe over the most recent `window` observations.
    pub latest_rolling_sharpe: Vec<Option<f64>>,
}

/// Owns the configuration, the market-data cache and the journal for a session.
pub struct Planner {
    config: Config,
    cache: MarketDataCache,
    journal: Option<Journal>,
}

impl Planner {
    /// Open the journal when enabled.
    pub fn new(config: Config) -> Result<Self> {
        let journal = if config.journal.enabled {
            Some(Journal::open(&config.journal_path())?)
        } else {
            None
        };
        Ok(Self {
            config,
            cache: MarketDataCache::new(),
            journal,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &MarketDataCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut MarketDataCache {
        &mut self.cache
    }

    fn market(&mut self) -> Result<(Arc<MarketData>, Option<Arc<Fundamentals>>)> {
        let data = self
            .cache
            .get_or_load_universe(&self.config.data.returns, &self.config.data.universe)?;
        let fundamentals = match self.config.data.fundamentals.clone() {
            Some(p) => Some(self.cache.get_or_load_fundamentals(&p)?),
            None => None,
        };
        Ok((data, fundamentals))
    }

    fn journal(&mut self, f: impl FnOnce(&mut Journal) -> Result<()>) -> Result<()> {
        match self.journal.as_mut() {
            Some(j) => f(j),
            None => Ok(()),
        }
    }

    /// Select, weight, analyse and project a portfolio.
    pub fn optimize(&mut self, request: &PortfolioRequest) -> Result<OptimizationOutcome> {
        self.journal(|j| j.record(&Event::started("optimize", request)))?;
        let (data, fundamentals) = self.market()?;
        let outcome = self.run_optimize(request, &data, fundamentals.as_deref())?;
        self.journal(|j| j.record(&Event::optimized(&outcome)))?;
        Ok(outcome)
    }

    fn run_optimize(
        &self,
        request: &PortfolioRequest,
        data: &MarketData,
        fundamentals: Option<&Fundamentals>,
    ) -> Result<OptimizationOutcome> {
        let engine = self.config.engine.engine_config();
        let selector = engine.qubo_selector(build_solver(&self.config));
        let betas: &dyn BetaLookup = match fundamentals {
            Some(f) => f,
            None => &NoBetas,
        };
        let outcome = optimize_portfolio(request, &data.estimates, &selector, betas, Some(&data.returns), &engine)?;
        if outcome.selection.is_best_effort() {
            warn!(
                "only {} assets available; requested {}",
                outcome.selection.len(),
                request.num_assets
            );
        }
        Ok(outcome)
    }

    /// Optimize, then simulate the resulting weights over the request horizon.
    pub fn simulate(&mut self, request: &PortfolioRequest) -> Result<SimulationReport> {
        self.journal(|j| j.record(&Event::started("simulate", request)))?;
        let (data, fundamentals) = self.market()?;
        let outcome = self.run_optimize(request, &data, fundamentals.as_deref())?;
        self.journal(|j| j.record(&Event::optimized(&outcome)))?;

        let simulation = simulate_outcome(&outcome, &data.estimates, &self.config.simulation.simulation_config())?;
        self.journal(|j| j.record(&Event::simulated(&simulation)))?;
        Ok(SimulationReport { outcome, simulation })
    }

    /// Optimized portfolio side by side with the baseline reference.
    pub fn compare(&mut self, request: &PortfolioRequest) -> Result<Comparison> {
        self.journal(|j| j.record(&Event::started("compare", request)))?;
        let (data, fundamentals) = self.market()?;
        let engine = self.config.engine.engine_config();
        let selector = engine.qubo_selector(build_solver(&self.config));
        let betas: &dyn BetaLookup = match fundamentals.as_deref() {
            Some(f) => f,
            None => &NoBetas,
        };
        let comparison = compare_with_baseline(
            request,
            &data.estimates,
            &selector,
            betas,
            Some(&data.returns),
            &engine,
        )?;
        self.journal(|j| j.record(&Event::optimized(&comparison.optimized)))?;
        self.journal(|j| j.record(&Event::compared(&comparison)))?;
        Ok(comparison)
    }

    /// Per-asset statistics, correlations and historical tails.
    pub fn stats(&mut self, window: usize, alpha: f64) -> Result<StatsReport> {
        if !(alpha > 0.0 && alpha < 1.0) {
            return Err(Error::Config(format!("alpha must be in (0, 1), got {alpha}")));
        }
        let (data, _) = self.market()?;
        let returns = &data.returns;
        let n = returns.symbols().len();

        let corr = stats::correlation_matrix(returns);
        let correlation = (0..n).map(|i| (0..n).map(|j| corr[(i, j)]).collect()).collect();

        let mut tails = Vec::with_capacity(n);
        let mut latest_rolling_sharpe = Vec::with_capacity(n);
        for (j, symbol) in returns.symbols().iter().enumerate() {
            let daily = returns.observed_column(j);
            if let Some((var, cvar)) = stats::historical_var_cvar(&daily, alpha) {
                tails.push(HistoricalTail {
                    symbol: symbol.clone(),
                    var,
                    cvar,
                });
            }
            let rolling = stats::rolling_metrics(&daily, window);
            latest_rolling_sharpe.push(rolling.sharpe.last().copied().flatten());
        }

        Ok(StatsReport {
            assets: stats::asset_summaries(returns),
            correlation,
            alpha,
            tails,
            window,
            latest_rolling_sharpe,
        })
    }

    /// Journal a failed command. Journal errors are logged, not returned.
    pub fn record_failure(&mut self, command: &str, error: &Error) {
        if let Err(e) = self.journal(|j| j.record(&Event::failed(command, error))) {
            warn!("could not journal failure: {e}");
        }
    }
}
