//! Multi-path Monte Carlo simulation of portfolio value.
//!
//! Each path draws `horizon_days` daily portfolio returns from
//! `N(wᵀμ/252, wᵀΣw/252)` (via the multivariate normal factor), compounds
//! `V_t = V_{t−1}·(1 + r_t)` from `V_0 = initial_investment`, and tracks
//! drawdown episodes online. Paths are independent: each has its own RNG
//! derived from `(seed, path index)`, so results are identical with or
//! without the `parallel` feature and regardless of scheduling.

mod drawdown;

pub use drawdown::{DrawdownSummary, DrawdownTracker};

use log::debug;
use nalgebra::DMatrix;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::error::{Result, SimulationError};
use crate::estimates::MarketEstimates;
use crate::mvn::{MultivariateNormal, PortfolioSampler};
use crate::stats;
use crate::types::{TRADING_DAYS, Weights};

/// Simulation parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimulationConfig {
    pub horizon_days: usize,
    pub simulations: usize,
    /// Percentiles in `[0, 100]` for final values, drawdowns and bands.
    pub percentiles: Vec<f64>,
    /// Confidence levels in `(0, 1)` for VaR/CVaR of final values.
    pub confidences: Vec<f64>,
    /// Drawdown that opens an episode.
    pub drawdown_threshold: f64,
    /// Full trajectories kept for display.
    pub sample_paths: usize,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            horizon_days: 252,
            simulations: 1_000,
            percentiles: vec![5.0, 25.0, 50.0, 75.0, 95.0],
            confidences: vec![0.95, 0.99],
            drawdown_threshold: 0.05,
            sample_paths: 10,
            seed: 42,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.horizon_days == 0 {
            return Err(SimulationError::ZeroHorizon.into());
        }
        if self.simulations == 0 {
            return Err(SimulationError::ZeroSimulations.into());
        }
        if let Some(&p) = self.percentiles.iter().find(|p| !(0.0..=100.0).contains(*p)) {
            return Err(SimulationError::InvalidPercentile(p).into());
        }
        if let Some(&c) = self.confidences.iter().find(|c| !(**c > 0.0 && **c < 1.0)) {
            return Err(SimulationError::InvalidConfidence(c).into());
        }
        if !(0.0..1.0).contains(&self.drawdown_threshold) {
            return Err(SimulationError::InvalidThreshold(self.drawdown_threshold).into());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Result records
// ---------------------------------------------------------------------------

/// A value at a percentile.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PercentilePoint {
    pub percentile: f64,
    pub value: f64,
}

/// Mean/median/extremes/std of a sample.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Summary {
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    /// Population standard deviation.
    pub std: f64,
}

impl Summary {
    /// `None` for an empty sample.
    pub fn of(values: &[f64]) -> Option<Self> {
        let sorted = stats::sorted(values);
        Some(Self {
            mean: stats::mean(&sorted)?,
            median: stats::percentile_of_sorted(&sorted, 50.0)?,
            min: *sorted.first()?,
            max: *sorted.last()?,
            std: stats::std_population(&sorted)?,
        })
    }
}

/// Distribution of per-path maximum drawdown.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DrawdownDistribution {
    pub summary: Summary,
    pub percentiles: Vec<PercentilePoint>,
}

/// Loss (in currency) at a confidence level, measured on final values.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TailLoss {
    pub confidence: f64,
    /// `initial − percentile(final, 100·(1−c))`
    pub var: f64,
    /// `initial − mean(final ≤ threshold)`
    pub cvar: f64,
}

/// Cross-path percentile of value at every time step.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PercentileBand {
    pub percentile: f64,
    pub values: Vec<f64>,
}

/// Aggregated outcome of a simulation run.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimulationResult {
    pub initial_investment: f64,
    pub horizon_days: usize,
    pub simulations: usize,
    /// Final value of every path, in path order.
    pub final_values: Vec<f64>,
    pub final_value: Summary,
    pub final_percentiles: Vec<PercentilePoint>,
    pub max_drawdown: DrawdownDistribution,
    /// Pooled over every closed episode; `None` when none closed.
    pub recovery_time: Option<Summary>,
    /// Pooled over every episode; `None` when none occurred.
    pub underwater_period: Option<Summary>,
    pub paths_with_drawdown: usize,
    pub tail: Vec<TailLoss>,
    /// `(V_final/V_0)^(252/h) − 1`, −1 for paths ending at or below zero.
    pub annualized_return: Summary,
    /// Step index of every path point, `0..=horizon_days`.
    pub time_points: Vec<usize>,
    pub bands: Vec<PercentileBand>,
    pub sample_paths: Vec<Vec<f64>>,
    /// Cross-path mean of the daily portfolio return at each step `1..=h`.
    pub daily_return_mean: Vec<f64>,
    /// Cross-path population std of the daily portfolio return at each step.
    pub daily_return_std: Vec<f64>,
}

impl SimulationResult {
    pub fn var_at(&self, confidence: f64) -> Option<&TailLoss> {
        self.tail.iter().find(|t| (t.confidence - confidence).abs() < 1e-12)
    }
}

impl std::fmt::Display for SimulationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Simulation: {} paths × {} days from {:.2}",
            self.simulations, self.horizon_days, self.initial_investment
        )?;
        for p in &self.final_percentiles {
            writeln!(f, "  P{:<3} final:     {:>14.2}", p.percentile, p.value)?;
        }
        writeln!(f, "  Mean final:      {:>14.2}", self.final_value.mean)?;
        writeln!(f, "  Mean max DD:     {:>13.2}%", self.max_drawdown.summary.mean * 100.0)?;
        match &self.recovery_time {
            Some(r) => writeln!(f, "  Mean recovery:   {:>11.1} days", r.mean)?,
            None => writeln!(f, "  Mean recovery:             n/a")?,
        }
        for t in &self.tail {
            writeln!(
                f,
                "  VaR/CVaR {:.0}%:    {:>14.2} / {:.2}",
                t.confidence * 100.0,
                t.var,
                t.cvar
            )?;
        }
        write!(f, "  Mean annualized: {:>13.2}%", self.annualized_return.mean * 100.0)
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

struct PathOutcome {
    values: Vec<f64>,
    drawdown: DrawdownSummary,
}

impl PathOutcome {
    /// Simple return from step `t` to `t + 1`; 0 once the path is wiped out.
    fn step_return(&self, t: usize) -> f64 {
        let base = self.values[t];
        if base > 0.0 { self.values[t + 1] / base - 1.0 } else { 0.0 }
    }
}

/// SplitMix64 finaliser mixing the run seed with a stream index.
fn stream_seed(seed: u64, index: u64) -> u64 {
    let mut z = seed ^ index.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(feature = "parallel")]
fn map_indices<T, F>(n: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync + Send,
{
    use rayon::prelude::*;

    (0..n).into_par_iter().map(f).collect()
}

#[cfg(not(feature = "parallel"))]
fn map_indices<T, F>(n: usize, f: F) -> Vec<T>
where
    F: Fn(usize) -> T,
{
    (0..n).map(f).collect()
}

fn run_path(sampler: &PortfolioSampler, initial: f64, config: &SimulationConfig, index: usize) -> PathOutcome {
    let mut rng = StdRng::seed_from_u64(stream_seed(config.seed, index as u64));
    let mut values = Vec::with_capacity(config.horizon_days + 1);
    let mut tracker = DrawdownTracker::new(initial, config.drawdown_threshold);

    let mut value = initial;
    values.push(value);
    for t in 1..=config.horizon_days {
        let r = sampler.sample(&mut rng);
        value *= 1.0 + r;
        values.push(value);
        tracker.update(t, value);
    }

    PathOutcome {
        values,
        drawdown: tracker.finish(),
    }
}

/// Simulate `weights` over named estimates.
pub fn simulate_weights(
    weights: &Weights,
    estimates: &MarketEstimates,
    initial_investment: f64,
    config: &SimulationConfig,
) -> Result<SimulationResult> {
    let sub = estimates.subset_by_symbols(weights.symbols())?;
    simulate(
        weights.values(),
        sub.expected_returns(),
        sub.covariance(),
        initial_investment,
        config,
    )
}

/// Simulate a fixed-weight portfolio over annualised `(μ, Σ)`.
pub fn simulate(
    weights: &[f64],
    mu: &[f64],
    cov: &DMatrix<f64>,
    initial_investment: f64,
    config: &SimulationConfig,
) -> Result<SimulationResult> {
    config.validate()?;
    if !(initial_investment.is_finite() && initial_investment > 0.0) {
        return Err(SimulationError::InvalidInvestment(initial_investment).into());
    }

    let daily_mu: Vec<f64> = mu.iter().map(|m| m / TRADING_DAYS).collect();
    let mvn = MultivariateNormal::new(&daily_mu, &(cov / TRADING_DAYS))?;
    let sampler = mvn.portfolio(weights)?;
    debug!(
        "simulating {} paths × {} days (daily mean {:.6}, daily std {:.6})",
        config.simulations,
        config.horizon_days,
        sampler.mean(),
        sampler.std_dev()
    );

    let paths = map_indices(config.simulations, |i| {
        run_path(&sampler, initial_investment, config, i)
    });

    Ok(aggregate(&paths, initial_investment, config))
}

fn percentile_points(sorted: &[f64], percentiles: &[f64]) -> Vec<PercentilePoint> {
    percentiles
        .iter()
        .filter_map(|&p| {
            stats::percentile_of_sorted(sorted, p).map(|value| PercentilePoint { percentile: p, value })
        })
        .collect()
}

fn aggregate(paths: &[PathOutcome], initial: f64, config: &SimulationConfig) -> SimulationResult {
    let h = config.horizon_days;
    let n = paths.len();

    let final_values: Vec<f64> = paths.iter().map(|p| p.values[h]).collect();
    let sorted_final = stats::sorted(&final_values);

    let max_drawdowns: Vec<f64> = paths.iter().map(|p| p.drawdown.max_drawdown).collect();
    let sorted_dd = stats::sorted(&max_drawdowns);

    let recoveries: Vec<f64> = paths
        .iter()
        .flat_map(|p| p.drawdown.recovery_times.iter().map(|&r| r as f64))
        .collect();
    let underwater: Vec<f64> = paths
        .iter()
        .flat_map(|p| p.drawdown.underwater_periods.iter().map(|&u| u as f64))
        .collect();

    let tail = config
        .confidences
        .iter()
        .map(|&c| {
            let threshold = stats::percentile_of_sorted(&sorted_final, 100.0 * (1.0 - c)).unwrap_or(initial);
            let tail: Vec<f64> = sorted_final.iter().copied().take_while(|v| *v <= threshold).collect();
            let tail_mean = stats::mean(&tail).map_or(threshold, |m| m.min(threshold));
            TailLoss {
                confidence: c,
                var: initial - threshold,
                cvar: initial - tail_mean,
            }
        })
        .collect();

    let years = h as f64 / TRADING_DAYS;
    let annualized: Vec<f64> = final_values
        .iter()
        .map(|v| {
            if *v <= 0.0 {
                -1.0
            } else {
                (v / initial).powf(1.0 / years) - 1.0
            }
        })
        .collect();

    // Cross-path statistics at each step.
    let step_bands: Vec<Vec<f64>> = map_indices(h + 1, |t| {
        let column: Vec<f64> = paths.iter().map(|p| p.values[t]).collect();
        let sorted = stats::sorted(&column);
        config
            .percentiles
            .iter()
            .map(|&p| stats::percentile_of_sorted(&sorted, p).unwrap_or(initial))
            .collect()
    });
    let bands = config
        .percentiles
        .iter()
        .enumerate()
        .map(|(j, &p)| PercentileBand {
            percentile: p,
            values: step_bands.iter().map(|row| row[j]).collect(),
        })
        .collect();

    let (daily_return_mean, daily_return_std): (Vec<f64>, Vec<f64>) = (0..h)
        .map(|t| {
            let column: Vec<f64> = paths.iter().map(|p| p.step_return(t)).collect();
            (
                stats::mean(&column).unwrap_or(0.0),
                stats::std_population(&column).unwrap_or(0.0),
            )
        })
        .unzip();

    let sample_paths = {
        let mut rng = StdRng::seed_from_u64(stream_seed(config.seed, u64::MAX));
        let mut picks = rand::seq::index::sample(&mut rng, n, config.sample_paths.min(n)).into_vec();
        picks.sort_unstable();
        picks.into_iter().map(|i| paths[i].values.clone()).collect()
    };

    SimulationResult {
        initial_investment: initial,
        horizon_days: h,
        simulations: n,
        final_value: Summary::of(&final_values).unwrap_or_default(),
        final_percentiles: percentile_points(&sorted_final, &config.percentiles),
        max_drawdown: DrawdownDistribution {
            summary: Summary::of(&max_drawdowns).unwrap_or_default(),
            percentiles: percentile_points(&sorted_dd, &config.percentiles),
        },
        recovery_time: Summary::of(&recoveries),
        underwater_period: Summary::of(&underwater),
        paths_with_drawdown: paths.iter().filter(|p| p.drawdown.had_episode()).count(),
        tail,
        annualized_return: Summary::of(&annualized).unwrap_or_default(),
        time_points: (0..=h).collect(),
        bands,
        sample_paths,
        daily_return_mean,
        daily_return_std,
        final_values,
    }
}
