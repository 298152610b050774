//! Market data files and the caller-owned cache that holds them.
//!
//! Returns file:
//!
//! ```json
//! { "dates": ["2024-01-02", "2024-01-03"],
//!   "returns": { "AAPL": [0.012, null], "MSFT": [-0.004, 0.007] } }
//! ```
//!
//! Fundamentals file (every field optional):
//!
//! ```json
//! { "AAPL": { "price": 190.2, "market_cap": 2.9e12, "beta": 1.21,
//!             "pe_ratio": 29.5, "dividend_yield": 0.005, "roe": 1.47 } }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use log::{debug, info};
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use quantfolio::{BetaLookup, MarketEstimates, ReturnMatrix};

use crate::error::{Error, Result};

/// Read and parse a JSON input file.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path).map_err(|e| Error::InputRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&contents).map_err(|e| Error::InputParse {
        path: path.to_path_buf(),
        source: e,
    })
}

#[derive(Debug, Deserialize)]
struct ReturnsFile {
    dates: Vec<NaiveDate>,
    returns: BTreeMap<String, Vec<Option<f64>>>,
}

/// Daily returns with their annualised estimates.
#[derive(Debug, Clone)]
pub struct MarketData {
    pub returns: ReturnMatrix,
    pub estimates: MarketEstimates,
}

impl MarketData {
    pub fn new(returns: ReturnMatrix) -> quantfolio::Result<Self> {
        let estimates = MarketEstimates::from_returns(&returns)?;
        Ok(Self { returns, estimates })
    }

    /// Load a returns file. Symbols are ordered alphabetically.
    pub fn load(path: &Path) -> Result<Self> {
        let file: ReturnsFile = read_json(path)?;
        Self::from_file(file).map_err(|source| Error::MarketData {
            path: path.to_path_buf(),
            source,
        })
    }

    fn from_file(file: ReturnsFile) -> quantfolio::Result<Self> {
        let returns = ReturnMatrix::from_columns(file.dates, file.returns.into_iter().collect())?;
        Self::new(returns)
    }

    /// Data restricted to `symbols`; the full data when `symbols` is empty.
    pub fn restrict(&self, symbols: &[String]) -> quantfolio::Result<Self> {
        if symbols.is_empty() {
            return Ok(self.clone());
        }
        Self::new(self.returns.subset_by_symbols(symbols)?)
    }
}

/// Descriptive fields for one symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fundamental {
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub beta: Option<f64>,
    #[serde(default)]
    pub pe_ratio: Option<f64>,
    #[serde(default)]
    pub dividend_yield: Option<f64>,
    #[serde(default)]
    pub roe: Option<f64>,
}

/// Fundamentals keyed by symbol.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Fundamentals(FxHashMap<String, Fundamental>);

impl Fundamentals {
    pub fn load(path: &Path) -> Result<Self> {
        read_json(path)
    }

    pub fn get(&self, symbol: &str) -> Option<&Fundamental> {
        self.0.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Fundamental)> for Fundamentals {
    fn from_iter<I: IntoIterator<Item = (String, Fundamental)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl BetaLookup for Fundamentals {
    fn beta(&self, symbol: &str) -> Option<f64> {
        self.0.get(symbol).and_then(|f| f.beta)
    }
}

/// Loaded market data keyed by file path.
///
/// Owned by the caller; entries live until invalidated or cleared.
#[derive(Debug, Default)]
pub struct MarketDataCache {
    returns: FxHashMap<PathBuf, Arc<MarketData>>,
    /// Estimates restricted to a universe, per returns file.
    universes: FxHashMap<PathBuf, FxHashMap<Vec<String>, Arc<MarketData>>>,
    fundamentals: FxHashMap<PathBuf, Arc<Fundamentals>>,
}

impl MarketDataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns data for `path`, reading the file on first use.
    pub fn get_or_load(&mut self, path: &Path) -> Result<Arc<MarketData>> {
        if let Some(hit) = self.returns.get(path) {
            debug!("market data cache hit: {}", path.display());
            return Ok(Arc::clone(hit));
        }
        let data = Arc::new(MarketData::load(path)?);
        info!(
            "loaded {} assets × {} days from {}",
            data.returns.symbols().len(),
            data.returns.len(),
            path.display()
        );
        self.returns.insert(path.to_path_buf(), Arc::clone(&data));
        Ok(data)
    }

    /// Returns data for `path` restricted to `symbols`, estimated once per
    /// universe. An empty universe is the whole file.
    pub fn get_or_load_universe(&mut self, path: &Path, symbols: &[String]) -> Result<Arc<MarketData>> {
        if symbols.is_empty() {
            return self.get_or_load(path);
        }
        if let Some(hit) = self.universes.get(path).and_then(|u| u.get(symbols)) {
            debug!("universe cache hit: {} ({} symbols)", path.display(), symbols.len());
            return Ok(Arc::clone(hit));
        }
        let full = self.get_or_load(path)?;
        let data = Arc::new(full.restrict(symbols).map_err(|source| Error::MarketData {
            path: path.to_path_buf(),
            source,
        })?);
        self.universes
            .entry(path.to_path_buf())
            .or_default()
            .insert(symbols.to_vec(), Arc::clone(&data));
        Ok(data)
    }

    /// Fundamentals for `path`, reading the file on first use.
    pub fn get_or_load_fundamentals(&mut self, path: &Path) -> Result<Arc<Fundamentals>> {
        if let Some(hit) = self.fundamentals.get(path) {
            debug!("fundamentals cache hit: {}", path.display());
            return Ok(Arc::clone(hit));
        }
        let data = Arc::new(Fundamentals::load(path)?);
        info!("loaded fundamentals for {} symbols from {}", data.len(), path.display());
        self.fundamentals.insert(path.to_path_buf(), Arc::clone(&data));
        Ok(data)
    }

    /// Drop every entry loaded from `path`. Returns whether anything was cached.
    pub fn invalidate(&mut self, path: &Path) -> bool {
        self.universes.remove(path);
        let a = self.returns.remove(path).is_some();
        let b = self.fundamentals.remove(path).is_some();
        a || b
    }

    pub fn clear(&mut self) {
        self.returns.clear();
        self.universes.clear();
        self.fundamentals.clear();
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.returns.contains_key(path) || self.fundamentals.contains_key(path)
    }

    /// Number of cached files.
    pub fn len(&self) -> usize {
        self.returns.len() + self.fundamentals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
