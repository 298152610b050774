//! Closed-form value projection over a horizon in years.

use std::collections::HashMap;
use std::hash::BuildHasher;

use crate::analysis::blended_stats;
use crate::error::{DataError, Result};
use crate::estimates::MarketEstimates;
use crate::types::{RiskTolerance, Weights};

/// Source of per-asset market betas. Unknown or non-finite betas are skipped.
pub trait BetaLookup: Sync {
    fn beta(&self, symbol: &str) -> Option<f64>;
}

impl<S: BuildHasher + Sync> BetaLookup for HashMap<String, f64, S> {
    fn beta(&self, symbol: &str) -> Option<f64> {
        self.get(symbol).copied()
    }
}

/// No beta data at all; portfolio beta reports 0.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoBetas;

impl BetaLookup for NoBetas {
    fn beta(&self, _symbol: &str) -> Option<f64> {
        None
    }
}

/// Weighted mean beta over assets with a known, finite beta; 0 if none.
pub fn portfolio_beta(weights: &Weights, betas: &dyn BetaLookup) -> f64 {
    let (num, den) = weights
        .iter()
        .filter_map(|(symbol, w)| betas.beta(symbol).filter(|b| b.is_finite()).map(|b| (w * b, w)))
        .fold((0.0, 0.0), |(n, d), (wb, w)| (n + wb, d + w));
    if den > 0.0 { num / den } else { 0.0 }
}

/// Dollar amount attributed to one asset of the projected value.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AssetValue {
    pub symbol: String,
    pub value: f64,
}

/// Projection of an investment over `horizon_years`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Projection {
    pub investment: f64,
    pub horizon_years: u32,
    /// Blended (cash + risky) annual return used for the central projection.
    pub expected_annual_return: f64,
    /// Unblended `wᵀμ`.
    pub risky_return: f64,
    /// Unblended `√(wᵀΣw)`.
    pub volatility: f64,
    pub beta: f64,
    pub projected_value: f64,
    /// Compounded at `risky_return − volatility`, growth base floored at 0.
    pub range_lower: f64,
    /// Compounded at `risky_return + volatility`.
    pub range_upper: f64,
    pub roi: f64,
    pub cagr: f64,
    pub asset_values: Vec<AssetValue>,
}

impl std::fmt::Display for Projection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Projection over {} years", self.horizon_years)?;
        writeln!(f, "  Invested:        {:>14.2}", self.investment)?;
        writeln!(f, "  Projected value: {:>14.2}", self.projected_value)?;
        writeln!(
            f,
            "  1σ range:        {:>14.2} .. {:.2}",
            self.range_lower, self.range_upper
        )?;
        writeln!(f, "  Annual return:   {:>13.2}%", self.expected_annual_return * 100.0)?;
        writeln!(f, "  Volatility:      {:>13.2}%", self.volatility * 100.0)?;
        writeln!(f, "  Beta:            {:>14.2}", self.beta)?;
        writeln!(f, "  ROI:             {:>13.2}%", self.roi * 100.0)?;
        write!(f, "  CAGR:            {:>13.2}%", self.cagr * 100.0)
    }
}

fn check_amount(amount: f64) -> Result<()> {
    if !(amount.is_finite() && amount > 0.0) {
        return Err(DataError::OutOfRange {
            field: "investment amount",
            value: amount,
            range: "(0, ∞)",
        }
        .into());
    }
    Ok(())
}

fn check_horizon(years: u32) -> Result<()> {
    if years == 0 {
        return Err(DataError::OutOfRange {
            field: "horizon years",
            value: 0.0,
            range: "[1, 100]",
        }
        .into());
    }
    Ok(())
}

/// Project `investment` held in `weights` for `horizon_years`.
pub fn project(
    weights: &Weights,
    estimates: &MarketEstimates,
    risk: RiskTolerance,
    investment: f64,
    horizon_years: u32,
    risk_free: f64,
    betas: &dyn BetaLookup,
) -> Result<Projection> {
    check_amount(investment)?;
    check_horizon(horizon_years)?;

    let sub = estimates.subset_by_symbols(weights.symbols())?;
    let stats = blended_stats(weights.values(), sub.expected_returns(), sub.covariance(), risk, risk_free)?;
    let years = horizon_years as i32;

    let projected_value = investment * (1.0 + stats.expected_return).max(0.0).powi(years);
    let range_upper = investment * (1.0 + stats.risky_return + stats.risky_volatility).max(0.0).powi(years);
    let range_lower = investment * (1.0 + stats.risky_return - stats.risky_volatility).max(0.0).powi(years);

    let roi = (projected_value - investment) / investment;
    let growth = projected_value / investment;
    let cagr = if growth > 0.0 {
        growth.powf(1.0 / horizon_years as f64) - 1.0
    } else {
        -1.0
    };

    Ok(Projection {
        investment,
        horizon_years,
        expected_annual_return: stats.expected_return,
        risky_return: stats.risky_return,
        volatility: stats.risky_volatility,
        beta: portfolio_beta(weights, betas),
        projected_value,
        range_lower,
        range_upper,
        roi,
        cagr,
        asset_values: weights
            .iter()
            .map(|(symbol, w)| AssetValue {
                symbol: symbol.to_string(),
                value: w * projected_value,
            })
            .collect(),
    })
}

/// One row of the per-asset allocation table.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AllocationRow {
    pub symbol: String,
    pub weight: f64,
    pub investment: f64,
    pub annual_return: f64,
    pub volatility: f64,
    /// `(annual_return − rf) / volatility`, 0 when volatility is 0.
    pub sharpe: f64,
    /// `investment · (1 + annual_return)^years`, growth base floored at 0.
    pub returned_amount: f64,
}

/// Per-asset investment and compounded outcome at each asset's own return.
pub fn allocation_table(
    weights: &Weights,
    estimates: &MarketEstimates,
    investment: f64,
    horizon_years: u32,
    risk_free: f64,
) -> Result<Vec<AllocationRow>> {
    check_amount(investment)?;
    check_horizon(horizon_years)?;

    let vols = estimates.volatilities();
    weights
        .iter()
        .map(|(symbol, w)| -> Result<AllocationRow> {
            let i = estimates
                .index_of(symbol)
                .ok_or_else(|| DataError::UnknownSymbol(symbol.to_string()))?;
            let annual_return = estimates.expected_returns()[i];
            let volatility = vols[i];
            let amount = w * investment;
            Ok(AllocationRow {
                symbol: symbol.to_string(),
                weight: w,
                investment: amount,
                annual_return,
                volatility,
                sharpe: if volatility > 0.0 {
                    (annual_return - risk_free) / volatility
                } else {
                    0.0
                },
                returned_amount: amount * (1.0 + annual_return).max(0.0).powi(horizon_years as i32),
            })
        })
        .collect()
}
