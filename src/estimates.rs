//! Return matrices and annualised market estimates (μ, Σ).
//!
//! A [`ReturnMatrix`] holds daily fractional returns, one row per date and one
//! column per asset. Missing observations are stored as NaN and skipped by
//! every statistic, matching pandas' NaN-aware `mean`/`cov`.
//!
//! [`MarketEstimates`] is the annualised view consumed by the rest of the
//! engine: `μ = mean_daily × 252` and `Σ = cov_daily × 252`.

use chrono::NaiveDate;
use nalgebra::DMatrix;
use rustc_hash::FxHashMap;

use crate::error::{DataError, Result};
use crate::types::TRADING_DAYS;

/// Relative tolerance for covariance symmetry checks.
const SYMMETRY_TOLERANCE: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Return matrix
// ---------------------------------------------------------------------------

/// Daily returns: `rows[t][j]` is asset `j`'s return on `dates[t]`.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ReturnMatrix {
    dates: Vec<NaiveDate>,
    symbols: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl ReturnMatrix {
    /// Validate and build a return matrix.
    ///
    /// Rejects empty input, duplicate or empty symbols, ragged rows, ±Inf,
    /// non-increasing dates, and columns with fewer than two observations.
    pub fn new(dates: Vec<NaiveDate>, symbols: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        if symbols.is_empty() {
            return Err(DataError::Empty("symbol list").into());
        }
        if rows.is_empty() {
            return Err(DataError::Empty("return matrix").into());
        }
        if dates.len() != rows.len() {
            return Err(DataError::DimensionMismatch {
                what: "dates",
                expected: rows.len(),
                got: dates.len(),
            }
            .into());
        }
        symbol_index(&symbols)?;

        for row in &rows {
            if row.len() != symbols.len() {
                return Err(DataError::DimensionMismatch {
                    what: "return row",
                    expected: symbols.len(),
                    got: row.len(),
                }
                .into());
            }
            if row.iter().any(|r| r.is_infinite()) {
                return Err(DataError::NonFinite("return matrix").into());
            }
        }

        if let Some(row) = dates.windows(2).position(|w| w[0] >= w[1]) {
            return Err(DataError::DatesNotIncreasing { row: row + 1 }.into());
        }

        for (j, symbol) in symbols.iter().enumerate() {
            let observed = rows.iter().filter(|row| row[j].is_finite()).count();
            if observed < 2 {
                return Err(DataError::InsufficientObservations(symbol.clone()).into());
            }
        }

        Ok(Self {
            dates,
            symbols,
            rows,
        })
    }

    /// Build from per-asset columns. `None` marks a missing observation.
    pub fn from_columns(dates: Vec<NaiveDate>, columns: Vec<(String, Vec<Option<f64>>)>) -> Result<Self> {
        let n_rows = dates.len();
        let mut symbols = Vec::with_capacity(columns.len());
        let mut rows = vec![Vec::with_capacity(columns.len()); n_rows];

        for (symbol, values) in columns {
            if values.len() != n_rows {
                return Err(DataError::DimensionMismatch {
                    what: "return column",
                    expected: n_rows,
                    got: values.len(),
                }
                .into());
            }
            for (row, v) in rows.iter_mut().zip(values) {
                row.push(v.unwrap_or(f64::NAN));
            }
            symbols.push(symbol);
        }

        Self::new(dates, symbols, rows)
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Number of dates.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column `j` including NaN gaps.
    pub fn column(&self, j: usize) -> Vec<f64> {
        self.rows.iter().map(|row| row[j]).collect()
    }

    /// Column `j` with missing observations dropped.
    pub fn observed_column(&self, j: usize) -> Vec<f64> {
        self.rows
            .iter()
            .map(|row| row[j])
            .filter(|r| r.is_finite())
            .collect()
    }

    fn column_indices(&self, symbols: &[String]) -> Result<Vec<usize>> {
        symbols
            .iter()
            .map(|s| {
                self.symbols
                    .iter()
                    .position(|x| x == s)
                    .ok_or_else(|| crate::Error::from(DataError::UnknownSymbol(s.clone())))
            })
            .collect()
    }

    /// Matrix restricted to the named columns (in the given order).
    pub fn subset_by_symbols(&self, symbols: &[String]) -> Result<Self> {
        let columns = self.column_indices(symbols)?;
        let rows = self
            .rows
            .iter()
            .map(|row| columns.iter().map(|&j| row[j]).collect())
            .collect();
        Self::new(self.dates.clone(), symbols.to_vec(), rows)
    }

    /// Daily portfolio returns `Σ w_i r_i` over the dates on which every
    /// listed asset has an observation.
    pub fn portfolio_returns(&self, symbols: &[String], weights: &[f64]) -> Result<Vec<f64>> {
        if symbols.len() != weights.len() {
            return Err(DataError::DimensionMismatch {
                what: "portfolio weights",
                expected: symbols.len(),
                got: weights.len(),
            }
            .into());
        }
        let columns = self.column_indices(symbols)?;

        Ok(self
            .rows
            .iter()
            .filter(|row| columns.iter().all(|&j| row[j].is_finite()))
            .map(|row| columns.iter().zip(weights).map(|(&j, w)| w * row[j]).sum())
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Market estimates
// ---------------------------------------------------------------------------

/// Annualised expected returns and covariance over a named universe.
#[derive(Clone, Debug)]
pub struct MarketEstimates {
    symbols: Vec<String>,
    index: FxHashMap<String, usize>,
    expected_returns: Vec<f64>,
    covariance: DMatrix<f64>,
}

impl MarketEstimates {
    /// Validate externally supplied annualised estimates.
    ///
    /// Σ must be square, finite, symmetric (within a relative tolerance; it is
    /// re-symmetrised) and have a non-negative diagonal.
    pub fn new(symbols: Vec<String>, expected_returns: Vec<f64>, covariance: DMatrix<f64>) -> Result<Self> {
        let n = symbols.len();
        if n == 0 {
            return Err(DataError::Empty("universe").into());
        }
        let index = symbol_index(&symbols)?;
        if expected_returns.len() != n {
            return Err(DataError::DimensionMismatch {
                what: "expected returns",
                expected: n,
                got: expected_returns.len(),
            }
            .into());
        }
        if covariance.nrows() != n || covariance.ncols() != n {
            return Err(DataError::DimensionMismatch {
                what: "covariance",
                expected: n,
                got: covariance.nrows().max(covariance.ncols()),
            }
            .into());
        }
        if expected_returns.iter().any(|m| !m.is_finite()) {
            return Err(DataError::NonFinite("expected returns").into());
        }
        if covariance.iter().any(|c| !c.is_finite()) {
            return Err(DataError::NonFinite("covariance").into());
        }

        let scale = covariance.amax().max(1e-300);
        for i in 0..n {
            if covariance[(i, i)] < 0.0 {
                return Err(DataError::NotPositiveSemiDefinite {
                    min_eigenvalue: covariance[(i, i)],
                }
                .into());
            }
            for j in (i + 1)..n {
                if (covariance[(i, j)] - covariance[(j, i)]).abs() > SYMMETRY_TOLERANCE * scale {
                    return Err(DataError::AsymmetricCovariance.into());
                }
            }
        }
        let covariance = (&covariance + covariance.transpose()) * 0.5;

        Ok(Self {
            symbols,
            index,
            expected_returns,
            covariance,
        })
    }

    /// Annualised estimates from daily returns.
    ///
    /// μ uses every observation of each asset; Σ uses pairwise-complete
    /// observations with an `n - 1` denominator.
    pub fn from_returns(returns: &ReturnMatrix) -> Result<Self> {
        let n = returns.symbols().len();
        let rows = returns.rows();

        let mut mu = Vec::with_capacity(n);
        for j in 0..n {
            let col = returns.observed_column(j);
            mu.push(col.iter().sum::<f64>() / col.len() as f64 * TRADING_DAYS);
        }

        let mut cov = DMatrix::zeros(n, n);
        for i in 0..n {
            for j in i..n {
                let pairs: Vec<(f64, f64)> = rows
                    .iter()
                    .map(|row| (row[i], row[j]))
                    .filter(|(a, b)| a.is_finite() && b.is_finite())
                    .collect();
                if pairs.len() < 2 {
                    return Err(DataError::InsufficientObservations(format!(
                        "{}/{}",
                        returns.symbols()[i],
                        returns.symbols()[j]
                    ))
                    .into());
                }
                let m = pairs.len() as f64;
                let mean_a = pairs.iter().map(|p| p.0).sum::<f64>() / m;
                let mean_b = pairs.iter().map(|p| p.1).sum::<f64>() / m;
                let ss: f64 = pairs.iter().map(|(a, b)| (a - mean_a) * (b - mean_b)).sum();
                let c = ss / (m - 1.0) * TRADING_DAYS;
                cov[(i, j)] = c;
                cov[(j, i)] = c;
            }
        }

        Self::new(returns.symbols().to_vec(), mu, cov)
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn expected_returns(&self) -> &[f64] {
        &self.expected_returns
    }

    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn index_of(&self, symbol: &str) -> Option<usize> {
        self.index.get(symbol).copied()
    }

    /// Universe indices for `symbols`, failing on the first unknown one.
    pub fn indices_of(&self, symbols: &[String]) -> Result<Vec<usize>> {
        symbols
            .iter()
            .map(|s| {
                self.index_of(s)
                    .ok_or_else(|| crate::Error::from(DataError::UnknownSymbol(s.clone())))
            })
            .collect()
    }

    /// Annualised volatility of each asset (`√Σ_ii`).
    pub fn volatilities(&self) -> Vec<f64> {
        (0..self.len()).map(|i| self.covariance[(i, i)].max(0.0).sqrt()).collect()
    }

    /// Estimates restricted to `indices` (in the given order).
    pub fn subset(&self, indices: &[usize]) -> Result<Self> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.len()) {
            return Err(DataError::DimensionMismatch {
                what: "subset index",
                expected: self.len(),
                got: bad,
            }
            .into());
        }
        let symbols: Vec<String> = indices.iter().map(|&i| self.symbols[i].clone()).collect();
        let mu = indices.iter().map(|&i| self.expected_returns[i]).collect();
        let cov = self.covariance.select_rows(indices).select_columns(indices);
        Self::new(symbols, mu, cov)
    }

    /// Estimates restricted to the named assets (in the given order).
    pub fn subset_by_symbols(&self, symbols: &[String]) -> Result<Self> {
        let indices = self.indices_of(symbols)?;
        self.subset(&indices)
    }
}

fn symbol_index(symbols: &[String]) -> Result<FxHashMap<String, usize>> {
    let mut index = FxHashMap::default();
    for (i, s) in symbols.iter().enumerate() {
        if s.is_empty() {
            return Err(DataError::Empty("symbol").into());
        }
        if index.insert(s.clone(), i).is_some() {
            return Err(DataError::DuplicateSymbol(s.clone()).into());
        }
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn sample_matrix() -> ReturnMatrix {
        ReturnMatrix::new(
            (1..=5).map(day).collect(),
            vec!["A".into(), "B".into()],
            vec![
                vec![0.01, 0.02],
                vec![-0.01, 0.00],
                vec![0.02, 0.01],
                vec![0.00, -0.01],
                vec![0.01, 0.03],
            ],
        )
        .unwrap()
    }

    #[test]
    fn annualised_mean() {
        let est = MarketEstimates::from_returns(&sample_matrix()).unwrap();
        assert!((est.expected_returns()[0] - 0.006 * 252.0).abs() < 1e-12);
        assert!((est.expected_returns()[1] - 0.01 * 252.0).abs() < 1e-12);
    }

    #[test]
    fn annualised_covariance_matches_sample_formula() {
        let est = MarketEstimates::from_returns(&sample_matrix()).unwrap();
        let a = [0.01, -0.01, 0.02, 0.00, 0.01];
        let mean = a.iter().sum::<f64>() / 5.0;
        let var = a.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / 4.0 * 252.0;
        assert!((est.covariance()[(0, 0)] - var).abs() < 1e-12);
        assert_eq!(est.covariance()[(0, 1)], est.covariance()[(1, 0)]);
    }

    #[test]
    fn missing_values_are_skipped() {
        let m = ReturnMatrix::from_columns(
            (1..=4).map(day).collect(),
            vec![
                ("A".into(), vec![Some(0.01), None, Some(0.03), Some(0.00)]),
                ("B".into(), vec![Some(0.02), Some(0.01), None, Some(0.01)]),
            ],
        )
        .unwrap();
        let est = MarketEstimates::from_returns(&m).unwrap();
        assert!((est.expected_returns()[0] - 0.04 / 3.0 * 252.0).abs() < 1e-12);
        assert!(est.covariance().iter().all(|c| c.is_finite()));
    }

    #[test]
    fn rejects_non_increasing_dates() {
        let err = ReturnMatrix::new(
            vec![day(2), day(1), day(3)],
            vec!["A".into()],
            vec![vec![0.01], vec![0.02], vec![0.03]],
        )
        .unwrap_err();
        assert_eq!(err, Error::Data(DataError::DatesNotIncreasing { row: 1 }));
    }

    #[test]
    fn rejects_empty_column() {
        let err = ReturnMatrix::new(
            (1..=3).map(day).collect(),
            vec!["A".into(), "B".into()],
            vec![vec![0.01, f64::NAN], vec![0.02, f64::NAN], vec![0.03, f64::NAN]],
        )
        .unwrap_err();
        assert_eq!(err, Error::Data(DataError::InsufficientObservations("B".into())));
    }

    #[test]
    fn rejects_duplicate_symbols() {
        let err = MarketEstimates::new(
            vec!["A".into(), "A".into()],
            vec![0.1, 0.1],
            DMatrix::identity(2, 2),
        )
        .unwrap_err();
        assert_eq!(err, Error::Data(DataError::DuplicateSymbol("A".into())));
    }

    #[test]
    fn rejects_asymmetric_covariance() {
        let cov = DMatrix::from_row_slice(2, 2, &[0.04, 0.01, 0.02, 0.09]);
        let err = MarketEstimates::new(vec!["A".into(), "B".into()], vec![0.1, 0.1], cov).unwrap_err();
        assert_eq!(err, Error::Data(DataError::AsymmetricCovariance));
    }

    #[test]
    fn subset_keeps_order() {
        let cov = DMatrix::from_row_slice(3, 3, &[0.04, 0.01, 0.0, 0.01, 0.09, 0.02, 0.0, 0.02, 0.16]);
        let est = MarketEstimates::new(
            vec!["A".into(), "B".into(), "C".into()],
            vec![0.1, 0.2, 0.3],
            cov,
        )
        .unwrap();
        let sub = est.subset(&[2, 0]).unwrap();
        assert_eq!(sub.symbols(), &["C".to_string(), "A".to_string()]);
        assert_eq!(sub.expected_returns(), &[0.3, 0.1]);
        assert_eq!(sub.covariance()[(0, 0)], 0.16);
        assert_eq!(sub.covariance()[(0, 1)], 0.0);
        assert_eq!(sub.index_of("A"), Some(1));
        assert!(est.subset(&[5]).is_err());
    }

    #[test]
    fn portfolio_returns_drop_incomplete_rows() {
        let m = ReturnMatrix::from_columns(
            (1..=3).map(day).collect(),
            vec![
                ("A".into(), vec![Some(0.01), None, Some(0.03)]),
                ("B".into(), vec![Some(0.03), Some(0.01), Some(0.01)]),
            ],
        )
        .unwrap();
        let r = m
            .portfolio_returns(&["A".into(), "B".into()], &[0.5, 0.5])
            .unwrap();
        assert_eq!(r.len(), 2);
        assert!((r[0] - 0.02).abs() < 1e-12);
        assert!(m.portfolio_returns(&["Z".into()], &[1.0]).is_err());
    }

    #[test]
    fn matrix_subset_by_symbols() {
        let m = sample_matrix();
        let sub = m.subset_by_symbols(&["B".into()]).unwrap();
        assert_eq!(sub.symbols(), &["B".to_string()]);
        assert_eq!(sub.column(0), m.column(1));
        assert_eq!(sub.dates(), m.dates());
        assert!(m.subset_by_symbols(&["Q".into()]).is_err());
    }
}
