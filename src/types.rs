//! Core types: RiskTolerance, Selection, Weights

use std::fmt;

use crate::error::{DataError, Result};

/// Trading days per year used for every annualisation in the crate.
pub const TRADING_DAYS: f64 = 252.0;

/// Tolerance on `sum(weights) == 1`.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// User risk tolerance in `[0, 1]`.
///
/// `0.0` is the most conservative setting, `1.0` the most aggressive.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "f64", into = "f64"))]
pub struct RiskTolerance(f64);

impl RiskTolerance {
    pub const CONSERVATIVE: RiskTolerance = RiskTolerance(0.0);
    pub const AGGRESSIVE: RiskTolerance = RiskTolerance(1.0);

    /// Validate and wrap a raw tolerance.
    pub fn new(value: f64) -> Result<Self> {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(DataError::OutOfRange {
                field: "risk tolerance",
                value,
                range: "[0, 1]",
            }
            .into());
        }
        Ok(Self(value))
    }

    #[inline]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for RiskTolerance {
    type Error = crate::Error;

    fn try_from(value: f64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<RiskTolerance> for f64 {
    fn from(risk: RiskTolerance) -> f64 {
        risk.0
    }
}

impl fmt::Display for RiskTolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// A set of assets chosen from a universe.
///
/// `indices` point into the universe the selection was drawn from and are
/// kept in ascending order; `symbols` are parallel to `indices`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawSelection"))]
pub struct Selection {
    symbols: Vec<String>,
    indices: Vec<usize>,
    best_effort: bool,
}

impl Selection {
    /// Build a selection from universe indices.
    pub(crate) fn from_indices(universe: &[String], mut indices: Vec<usize>, best_effort: bool) -> Self {
        indices.sort_unstable();
        indices.dedup();
        let symbols = indices.iter().map(|&i| universe[i].clone()).collect();
        Self {
            symbols,
            indices,
            best_effort,
        }
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// True when fewer assets than requested were available and the whole
    /// universe was returned instead.
    pub fn is_best_effort(&self) -> bool {
        self.best_effort
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.iter().any(|s| s == symbol)
    }
}

/// Unchecked wire form of [`Selection`].
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct RawSelection {
    symbols: Vec<String>,
    indices: Vec<usize>,
    best_effort: bool,
}

#[cfg(feature = "serde")]
impl TryFrom<RawSelection> for Selection {
    type Error = crate::Error;

    fn try_from(raw: RawSelection) -> Result<Self> {
        if raw.symbols.len() != raw.indices.len() {
            return Err(DataError::DimensionMismatch {
                what: "selection symbols",
                expected: raw.indices.len(),
                got: raw.symbols.len(),
            }
            .into());
        }
        if let Some(position) = raw.indices.windows(2).position(|p| p[0] >= p[1]) {
            return Err(DataError::IndicesNotIncreasing { position: position + 1 }.into());
        }
        Ok(Self {
            symbols: raw.symbols,
            indices: raw.indices,
            best_effort: raw.best_effort,
        })
    }
}

/// Long-only portfolio weights over named assets.
///
/// Invariant: every weight is finite and non-negative and the weights sum to
/// one within [`WEIGHT_SUM_TOLERANCE`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawWeights"))]
pub struct Weights {
    symbols: Vec<String>,
    values: Vec<f64>,
}

impl Weights {
    /// Validate and wrap a weight vector.
    pub fn new(symbols: Vec<String>, values: Vec<f64>) -> Result<Self> {
        if symbols.is_empty() {
            return Err(DataError::Empty("weight vector").into());
        }
        if symbols.len() != values.len() {
            return Err(DataError::DimensionMismatch {
                what: "weights",
                expected: symbols.len(),
                got: values.len(),
            }
            .into());
        }
        if values.iter().any(|w| !w.is_finite()) {
            return Err(DataError::NonFinite("weights").into());
        }
        if let Some(&w) = values.iter().find(|&&w| w < -1e-12) {
            return Err(DataError::OutOfRange {
                field: "weight",
                value: w,
                range: "[0, 1]",
            }
            .into());
        }
        let sum: f64 = values.iter().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(DataError::OutOfRange {
                field: "weight sum",
                value: sum,
                range: "1 ± 1e-6",
            }
            .into());
        }
        Ok(Self { symbols, values })
    }

    /// Equal weights over `symbols`.
    pub fn equal(symbols: Vec<String>) -> Result<Self> {
        let n = symbols.len();
        if n == 0 {
            return Err(DataError::Empty("weight vector").into());
        }
        Ok(Self {
            symbols,
            values: vec![1.0 / n as f64; n],
        })
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Weight of `symbol`, if present.
    pub fn get(&self, symbol: &str) -> Option<f64> {
        self.symbols
            .iter()
            .position(|s| s == symbol)
            .map(|i| self.values[i])
    }

    /// Iterator over `(symbol, weight)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.symbols
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

/// Unchecked wire form of [`Weights`].
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct RawWeights {
    symbols: Vec<String>,
    values: Vec<f64>,
}

#[cfg(feature = "serde")]
impl TryFrom<RawWeights> for Weights {
    type Error = crate::Error;

    fn try_from(raw: RawWeights) -> Result<Self> {
        Self::new(raw.symbols, raw.values)
    }
}

impl fmt::Display for Weights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (symbol, w) in self.iter() {
            writeln!(f, "  {symbol:<10} {:>7.2}%", w * 100.0)?;
        }
        Ok(())
    }
}
