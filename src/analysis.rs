//! Risk/return analytics for a weighted portfolio.
//!
//! - Two-fund blending: the risky sub-portfolio is mixed with risk-free cash
//!   in proportion to risk tolerance.
//! - Sortino from historical daily portfolio returns.
//! - Single-horizon VaR/CVaR by one-shot Monte Carlo from a multivariate
//!   normal scaled to the horizon.

use log::warn;
use nalgebra::DMatrix;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::error::{DataError, Result, SimulationError};
use crate::estimates::{MarketEstimates, ReturnMatrix};
use crate::mvn::MultivariateNormal;
use crate::optimize::quad_form;
use crate::stats;
use crate::types::{RiskTolerance, TRADING_DAYS, Weights};

fn check_rate(field: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(DataError::OutOfRange {
            field,
            value,
            range: "finite",
        }
        .into());
    }
    Ok(())
}

fn check_dims(weights: &[f64], mu: &[f64], cov: &DMatrix<f64>) -> Result<()> {
    if weights.len() != mu.len() {
        return Err(DataError::DimensionMismatch {
            what: "expected returns",
            expected: weights.len(),
            got: mu.len(),
        }
        .into());
    }
    if cov.nrows() != mu.len() || cov.ncols() != mu.len() {
        return Err(DataError::DimensionMismatch {
            what: "covariance",
            expected: mu.len(),
            got: cov.nrows(),
        }
        .into());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Blended statistics
// ---------------------------------------------------------------------------

/// Risky-leg and blended (cash + risky) statistics.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlendedStats {
    /// `wᵀμ`
    pub risky_return: f64,
    /// `√(wᵀΣw)`
    pub risky_volatility: f64,
    /// `(1−ρ)·rf + ρ·risky_return`
    pub expected_return: f64,
    /// `ρ·risky_volatility`
    pub volatility: f64,
    /// `(expected_return − rf) / volatility`, 0 when volatility is 0.
    pub sharpe: f64,
}

/// Two-fund separation statistics for weights over `(μ, Σ)`.
pub fn blended_stats(
    weights: &[f64],
    mu: &[f64],
    cov: &DMatrix<f64>,
    risk: RiskTolerance,
    risk_free: f64,
) -> Result<BlendedStats> {
    check_dims(weights, mu, cov)?;
    check_rate("risk-free rate", risk_free)?;

    let rho = risk.value();
    let risky_return: f64 = weights.iter().zip(mu).map(|(w, m)| w * m).sum();
    let risky_volatility = quad_form(cov, weights).max(0.0).sqrt();
    if !risky_return.is_finite() || !risky_volatility.is_finite() {
        return Err(DataError::NonFinite("portfolio statistics").into());
    }

    let expected_return = (1.0 - rho) * risk_free + rho * risky_return;
    let volatility = rho * risky_volatility;
    let sharpe = if volatility > 0.0 {
        (expected_return - risk_free) / volatility
    } else {
        0.0
    };

    Ok(BlendedStats {
        risky_return,
        risky_volatility,
        expected_return,
        volatility,
        sharpe,
    })
}

// ---------------------------------------------------------------------------
// Sortino
// ---------------------------------------------------------------------------

/// Downside statistics of a daily return series.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Downside {
    /// Mean of `r − rf/252`.
    pub mean_excess_return: f64,
    /// `√mean(min(r − rf/252, 0)²)`, daily.
    pub downside_deviation: f64,
    /// `mean_excess_return / downside_deviation`; `None` when the deviation is 0.
    pub sortino: Option<f64>,
}

/// Sortino ratio of daily returns against an annual risk-free rate.
pub fn sortino(daily_returns: &[f64], risk_free: f64) -> Result<Downside> {
    check_rate("risk-free rate", risk_free)?;
    if daily_returns.is_empty() {
        return Err(DataError::Empty("historical returns").into());
    }
    if daily_returns.iter().any(|r| !r.is_finite()) {
        return Err(DataError::NonFinite("historical returns").into());
    }

    let rf_daily = risk_free / TRADING_DAYS;
    let n = daily_returns.len() as f64;
    let mean_excess_return = daily_returns.iter().map(|r| r - rf_daily).sum::<f64>() / n;
    let downside_deviation = (daily_returns
        .iter()
        .map(|r| (r - rf_daily).min(0.0).powi(2))
        .sum::<f64>()
        / n)
        .sqrt();

    let sortino = (downside_deviation > 0.0).then(|| mean_excess_return / downside_deviation);
    Ok(Downside {
        mean_excess_return,
        downside_deviation,
        sortino,
    })
}

// ---------------------------------------------------------------------------
// Monte Carlo VaR
// ---------------------------------------------------------------------------

/// Settings for the single-horizon VaR/CVaR estimate.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VarConfig {
    pub horizon_days: usize,
    pub simulations: usize,
    /// Tail probability, e.g. 0.05 for 95% VaR.
    pub alpha: f64,
    pub seed: u64,
}

impl Default for VarConfig {
    fn default() -> Self {
        Self {
            horizon_days: 252,
            simulations: 5_000,
            alpha: 0.05,
            seed: 123,
        }
    }
}

impl VarConfig {
    pub fn validate(&self) -> Result<()> {
        if self.horizon_days == 0 {
            return Err(SimulationError::ZeroHorizon.into());
        }
        if self.simulations == 0 {
            return Err(SimulationError::ZeroSimulations.into());
        }
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(SimulationError::InvalidConfidence(1.0 - self.alpha).into());
        }
        Ok(())
    }
}

/// Horizon return distribution and its tail.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TailRisk {
    pub alpha: f64,
    pub horizon_days: usize,
    /// α-percentile of simulated horizon returns.
    pub var_return: f64,
    /// Mean of simulated returns at or below `var_return`.
    pub cvar_return: f64,
    /// `−var_return`
    pub var_loss: f64,
    /// `−cvar_return`
    pub cvar_loss: f64,
    pub mean_return: f64,
    /// Population standard deviation of the simulated returns.
    pub std_return: f64,
    pub samples: Vec<f64>,
}

/// Monte Carlo VaR/CVaR of `wᵀr` with `r ~ N(μ·h/252, Σ·h/252)`.
pub fn monte_carlo_var(weights: &[f64], mu: &[f64], cov: &DMatrix<f64>, config: &VarConfig) -> Result<TailRisk> {
    config.validate()?;
    check_dims(weights, mu, cov)?;

    let scale = config.horizon_days as f64 / TRADING_DAYS;
    let mean: Vec<f64> = mu.iter().map(|m| m * scale).collect();
    let mvn = MultivariateNormal::new(&mean, &(cov * scale))?;
    let sampler = mvn.portfolio(weights)?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let samples: Vec<f64> = (0..config.simulations).map(|_| sampler.sample(&mut rng)).collect();

    let sorted = stats::sorted(&samples);
    let var_return = stats::percentile_of_sorted(&sorted, config.alpha * 100.0)
        .ok_or(SimulationError::ZeroSimulations)?;
    let tail: Vec<f64> = sorted.iter().copied().take_while(|r| *r <= var_return).collect();
    let cvar_return = stats::mean(&tail).map_or(var_return, |m| m.min(var_return));

    Ok(TailRisk {
        alpha: config.alpha,
        horizon_days: config.horizon_days,
        var_return,
        cvar_return,
        var_loss: -var_return,
        cvar_loss: -cvar_return,
        mean_return: stats::mean(&samples).unwrap_or(0.0),
        std_return: stats::std_population(&samples).unwrap_or(0.0),
        samples,
    })
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// Everything the analyzer reports for one portfolio.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricsBundle {
    pub expected_return: f64,
    pub volatility: f64,
    pub sharpe: f64,
    /// `None` without history or when downside deviation is 0.
    pub sortino: Option<f64>,
    /// Daily downside deviation; `None` without history.
    pub downside_deviation: Option<f64>,
    pub var: f64,
    pub cvar: f64,
    pub blended: BlendedStats,
    pub tail: TailRisk,
}

impl std::fmt::Display for MetricsBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Portfolio Metrics")?;
        writeln!(f, "  Expected return: {:>8.2}%", self.expected_return * 100.0)?;
        writeln!(f, "  Volatility:      {:>8.2}%", self.volatility * 100.0)?;
        writeln!(f, "  Sharpe:          {:>8.2}", self.sharpe)?;
        match self.sortino {
            Some(s) => writeln!(f, "  Sortino:         {s:>8.2}")?,
            None => writeln!(f, "  Sortino:              n/a")?,
        }
        writeln!(
            f,
            "  VaR ({:.0}%):       {:>8.2}%",
            (1.0 - self.tail.alpha) * 100.0,
            self.var * 100.0
        )?;
        write!(
            f,
            "  CVaR ({:.0}%):      {:>8.2}%",
            (1.0 - self.tail.alpha) * 100.0,
            self.cvar * 100.0
        )
    }
}

/// Computes a [`MetricsBundle`] from weights and market estimates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RiskReturnAnalyzer {
    pub risk_free: f64,
    pub var: VarConfig,
}

impl Default for RiskReturnAnalyzer {
    fn default() -> Self {
        Self {
            risk_free: 0.02,
            var: VarConfig::default(),
        }
    }
}

impl RiskReturnAnalyzer {
    pub fn new(risk_free: f64, var: VarConfig) -> Self {
        Self { risk_free, var }
    }

    /// Analyse `weights`. `history` enables the Sortino ratio.
    pub fn analyze(
        &self,
        weights: &Weights,
        estimates: &MarketEstimates,
        risk: RiskTolerance,
        history: Option<&ReturnMatrix>,
    ) -> Result<MetricsBundle> {
        let sub = estimates.subset_by_symbols(weights.symbols())?;
        let w = weights.values();
        let blended = blended_stats(w, sub.expected_returns(), sub.covariance(), risk, self.risk_free)?;
        let tail = monte_carlo_var(w, sub.expected_returns(), sub.covariance(), &self.var)?;

        let downside = match history {
            Some(h) => {
                let daily = h.portfolio_returns(weights.symbols(), w)?;
                if daily.is_empty() {
                    warn!("no dates with complete history for the selection; Sortino unavailable");
                    None
                } else {
                    Some(sortino(&daily, self.risk_free)?)
                }
            }
            None => None,
        };

        Ok(MetricsBundle {
            expected_return: blended.expected_return,
            volatility: blended.volatility,
            sharpe: blended.sharpe,
            sortino: downside.and_then(|d| d.sortino),
            downside_deviation: downside.map(|d| d.downside_deviation),
            var: tail.var_return,
            cvar: tail.cvar_return,
            blended,
            tail,
        })
    }
}
