//! Validated portfolio request.

use crate::error::{DataError, Result};
use crate::types::{RiskTolerance, TRADING_DAYS};

/// Largest accepted horizon in years.
pub const MAX_HORIZON_YEARS: u32 = 100;

/// What the caller asks for: how much to invest, for how long, with how
/// many assets and at what risk tolerance.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PortfolioRequest {
    /// Risk tolerance in `[0, 1]`.
    pub risk: f64,
    /// Investment amount, finite and positive.
    pub amount: f64,
    /// Horizon in whole years, `1..=100`.
    pub horizon_years: u32,
    /// Number of assets to select, at least 1.
    pub num_assets: usize,
}

impl PortfolioRequest {
    /// Check every field against its legal range.
    pub fn validate(&self) -> Result<()> {
        RiskTolerance::new(self.risk)?;
        if !(self.amount.is_finite() && self.amount > 0.0) {
            return Err(DataError::OutOfRange {
                field: "amount",
                value: self.amount,
                range: "(0, ∞)",
            }
            .into());
        }
        if !(1..=MAX_HORIZON_YEARS).contains(&self.horizon_years) {
            return Err(DataError::OutOfRange {
                field: "horizon_years",
                value: self.horizon_years as f64,
                range: "[1, 100]",
            }
            .into());
        }
        if self.num_assets == 0 {
            return Err(DataError::OutOfRange {
                field: "num_assets",
                value: 0.0,
                range: "[1, ∞)",
            }
            .into());
        }
        Ok(())
    }

    pub fn risk_tolerance(&self) -> Result<RiskTolerance> {
        RiskTolerance::new(self.risk)
    }

    /// Horizon in trading days.
    pub fn horizon_days(&self) -> usize {
        self.horizon_years as usize * TRADING_DAYS as usize
    }
}
