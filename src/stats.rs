//! Descriptive statistics for return series.
//!
//! Sample helpers (mean, median, linear-interpolated percentiles) shared by
//! the analysis and simulation modules, plus per-asset summaries over a
//! [`ReturnMatrix`]: annualised return and volatility, Sharpe, max drawdown,
//! bias-corrected skewness and excess kurtosis, correlations, rolling
//! metrics and historical VaR/CVaR.
//!
//! # References
//!
//! - NumPy `percentile` (linear method): <https://numpy.org/doc/stable/reference/generated/numpy.percentile.html>
//! - pandas `skew`/`kurt` use the adjusted Fisher–Pearson estimators.

use nalgebra::DMatrix;

use crate::estimates::ReturnMatrix;
use crate::types::TRADING_DAYS;

// ---------------------------------------------------------------------------
// Sample helpers
// ---------------------------------------------------------------------------

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (`ddof = 0`).
pub fn std_population(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

/// Sample standard deviation (`ddof = 1`).
pub fn std_sample(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

/// Sort a copy of `values` ascending (NaNs compare equal).
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    v
}

/// Percentile `p` in `[0, 100]` of an ascending slice, linear interpolation
/// between closest ranks.
pub fn percentile_of_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=100.0).contains(&p) {
        return None;
    }
    let pos = p / 100.0 * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        return Some(sorted[lo]);
    }
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Percentile `p` in `[0, 100]` of unsorted values.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    percentile_of_sorted(&sorted(values), p)
}

/// Median of unsorted values.
pub fn median(values: &[f64]) -> Option<f64> {
    percentile(values, 50.0)
}

/// Pearson correlation over paired observations.
///
/// `None` for fewer than two pairs, mismatched lengths, or a constant side.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let (mx, my) = (mean(x)?, mean(y)?);
    let (sxy, sxx, syy) = x
        .iter()
        .zip(y)
        .map(|(a, b)| (a - mx, b - my))
        .fold((0.0, 0.0, 0.0), |(sxy, sxx, syy), (dx, dy)| {
            (sxy + dx * dy, sxx + dx * dx, syy + dy * dy)
        });
    let denom = (sxx * syy).sqrt();
    (denom > 0.0).then(|| (sxy / denom).clamp(-1.0, 1.0))
}

// ---------------------------------------------------------------------------
// Per-asset summaries
// ---------------------------------------------------------------------------

/// Descriptive statistics for one asset's daily return history.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AssetSummary {
    pub symbol: String,
    /// Mean daily return × 252.
    pub annual_return: f64,
    /// Sample std of daily returns × √252.
    pub annual_volatility: f64,
    /// `annual_return / annual_volatility`, 0 when volatility is 0.
    pub sharpe: f64,
    /// Largest peak-to-trough loss of the compounded series (positive fraction).
    pub max_drawdown: f64,
    pub skewness: f64,
    /// Excess kurtosis.
    pub kurtosis: f64,
    pub observations: usize,
}

/// Summaries for every asset in `returns`, in column order.
pub fn asset_summaries(returns: &ReturnMatrix) -> Vec<AssetSummary> {
    returns
        .symbols()
        .iter()
        .enumerate()
        .map(|(j, symbol)| summarize(symbol, &returns.observed_column(j)))
        .collect()
}

fn summarize(symbol: &str, daily: &[f64]) -> AssetSummary {
    let annual_return = mean(daily).unwrap_or(0.0) * TRADING_DAYS;
    let annual_volatility = std_sample(daily).unwrap_or(0.0) * TRADING_DAYS.sqrt();
    let sharpe = if annual_volatility > 0.0 {
        annual_return / annual_volatility
    } else {
        0.0
    };
    AssetSummary {
        symbol: symbol.to_string(),
        annual_return,
        annual_volatility,
        sharpe,
        max_drawdown: max_drawdown(daily),
        skewness: skewness(daily),
        kurtosis: excess_kurtosis(daily),
        observations: daily.len(),
    }
}

/// Largest peak-to-trough loss of `Π(1 + r)` as a fraction of the peak.
///
/// The curve starts at 1, so a first-day loss already counts.
pub fn max_drawdown(returns: &[f64]) -> f64 {
    returns
        .iter()
        .scan((1.0_f64, 1.0_f64), |(peak, equity), r| {
            *equity *= 1.0 + r;
            *peak = peak.max(*equity);
            Some(1.0 - *equity / *peak)
        })
        .fold(0.0, f64::max)
}

/// Central moments `(m2, m3, m4)` with a `1/n` denominator.
fn central_moments(values: &[f64]) -> (f64, f64, f64) {
    let n = values.len() as f64;
    let m = values.iter().sum::<f64>() / n;
    let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
    for v in values {
        let d = v - m;
        let d2 = d * d;
        m2 += d2;
        m3 += d2 * d;
        m4 += d2 * d2;
    }
    (m2 / n, m3 / n, m4 / n)
}

/// Adjusted Fisher–Pearson skewness (G1). 0 for fewer than 3 points or zero variance.
pub fn skewness(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 3 {
        return 0.0;
    }
    let (m2, m3, _) = central_moments(values);
    if m2 <= 0.0 {
        return 0.0;
    }
    let n = n as f64;
    let g1 = m3 / m2.powf(1.5);
    (n * (n - 1.0)).sqrt() / (n - 2.0) * g1
}

/// Bias-corrected excess kurtosis (G2). 0 for fewer than 4 points or zero variance.
pub fn excess_kurtosis(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 4 {
        return 0.0;
    }
    let (m2, _, m4) = central_moments(values);
    if m2 <= 0.0 {
        return 0.0;
    }
    let n = n as f64;
    let g2 = m4 / (m2 * m2) - 3.0;
    ((n + 1.0) * g2 + 6.0) * (n - 1.0) / ((n - 2.0) * (n - 3.0))
}

/// Pairwise-complete Pearson correlation matrix. Undefined entries are NaN.
pub fn correlation_matrix(returns: &ReturnMatrix) -> DMatrix<f64> {
    let n = returns.symbols().len();
    let mut corr = DMatrix::from_element(n, n, f64::NAN);
    for i in 0..n {
        for j in i..n {
            let (x, y): (Vec<f64>, Vec<f64>) = returns
                .rows()
                .iter()
                .map(|row| (row[i], row[j]))
                .filter(|(a, b)| a.is_finite() && b.is_finite())
                .unzip();
            let r = pearson(&x, &y).unwrap_or(f64::NAN);
            corr[(i, j)] = r;
            corr[(j, i)] = r;
        }
    }
    corr
}

/// Rolling annualised statistics; entries before the first full window are `None`.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RollingMetrics {
    pub annual_return: Vec<Option<f64>>,
    pub annual_volatility: Vec<Option<f64>>,
    pub sharpe: Vec<Option<f64>>,
}

/// Rolling mean × 252, std × √252 and their ratio over `window` observations.
pub fn rolling_metrics(daily: &[f64], window: usize) -> RollingMetrics {
    let mut out = RollingMetrics::default();
    for t in 0..daily.len() {
        if window < 2 || t + 1 < window {
            out.annual_return.push(None);
            out.annual_volatility.push(None);
            out.sharpe.push(None);
            continue;
        }
        let slice = &daily[t + 1 - window..=t];
        let ret = mean(slice).map(|m| m * TRADING_DAYS);
        let vol = std_sample(slice).map(|s| s * TRADING_DAYS.sqrt());
        let sharpe = match (ret, vol) {
            (Some(r), Some(v)) if v > 0.0 => Some(r / v),
            _ => None,
        };
        out.annual_return.push(ret);
        out.annual_volatility.push(vol);
        out.sharpe.push(sharpe);
    }
    out
}

/// Historical `(VaR, CVaR)` of daily returns at tail probability `alpha`,
/// reported as returns: VaR is the α-quantile and CVaR the mean of returns
/// at or below it.
pub fn historical_var_cvar(daily: &[f64], alpha: f64) -> Option<(f64, f64)> {
    if !(0.0..=1.0).contains(&alpha) {
        return None;
    }
    let s = sorted(daily);
    let var = percentile_of_sorted(&s, alpha * 100.0)?;
    let tail: Vec<f64> = s.iter().copied().take_while(|&r| r <= var).collect();
    let cvar = mean(&tail).map_or(var, |m| m.min(var));
    Some((var, cvar))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn percentile_matches_numpy_linear() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&v, 0.0), Some(1.0));
        assert_eq!(percentile(&v, 100.0), Some(4.0));
        assert!((percentile(&v, 50.0).unwrap() - 2.5).abs() < 1e-12);
        // numpy.percentile([1,2,3,4], 25) == 1.75
        assert!((percentile(&v, 25.0).unwrap() - 1.75).abs() < 1e-12);
        assert_eq!(percentile(&[], 50.0), None);
        assert_eq!(percentile(&v, 101.0), None);
    }

    #[test]
    fn std_variants() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((std_population(&v).unwrap() - 2.0).abs() < 1e-12);
        assert!(std_sample(&v).unwrap() > 2.0);
        assert_eq!(std_sample(&[1.0]), None);
    }

    #[test]
    fn max_drawdown_simple() {
        // Equity: 1.0 -> 1.1 -> 0.88 -> 0.924
        let returns = [0.10, -0.20, 0.05];
        assert!((max_drawdown(&returns) - 0.2).abs() < 1e-10);
        assert_eq!(max_drawdown(&[0.01, 0.02]), 0.0);
    }

    #[test]
    fn max_drawdown_counts_first_day_loss() {
        assert!((max_drawdown(&[-0.25, 0.10]) - 0.25).abs() < 1e-12);
        assert_eq!(max_drawdown(&[]), 0.0);
    }

    #[test]
    fn pearson_edge_cases() {
        let x = [1.0, 2.0, 3.0, 4.0];
        assert!((pearson(&x, &[2.0, 4.0, 6.0, 8.0]).unwrap() - 1.0).abs() < 1e-12);
        assert!((pearson(&x, &[4.0, 3.0, 2.0, 1.0]).unwrap() + 1.0).abs() < 1e-12);
        assert_eq!(pearson(&x, &[5.0; 4]), None);
        assert_eq!(pearson(&[1.0], &[1.0]), None);
        assert_eq!(pearson(&x, &[1.0, 2.0]), None);
    }

    #[test]
    fn skew_sign() {
        let right = [0.0, 0.0, 0.0, 0.0, 1.0];
        let left = [0.0, 0.0, 0.0, 0.0, -1.0];
        assert!(skewness(&right) > 0.0);
        assert!(skewness(&left) < 0.0);
        assert_eq!(skewness(&[1.0, 1.0, 1.0]), 0.0);
    }

    #[test]
    fn kurtosis_of_symmetric_two_point_is_negative() {
        let v = [-1.0, 1.0, -1.0, 1.0, -1.0, 1.0];
        assert!(excess_kurtosis(&v) < 0.0);
    }

    #[test]
    fn correlation_perfect() {
        let dates = (1..=4)
            .map(|d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap())
            .collect();
        let m = ReturnMatrix::new(
            dates,
            vec!["A".into(), "B".into(), "C".into()],
            vec![
                vec![0.01, 0.02, -0.01],
                vec![0.02, 0.04, -0.02],
                vec![-0.01, -0.02, 0.01],
                vec![0.03, 0.06, -0.03],
            ],
        )
        .unwrap();
        let c = correlation_matrix(&m);
        assert!((c[(0, 1)] - 1.0).abs() < 1e-12);
        assert!((c[(0, 2)] + 1.0).abs() < 1e-12);
        assert!((c[(2, 2)] - 1.0).abs() < 1e-12);

        let s = asset_summaries(&m);
        assert_eq!(s.len(), 3);
        assert_eq!(s[1].symbol, "B");
        assert!((s[1].annual_return - 2.0 * s[0].annual_return).abs() < 1e-12);
    }

    #[test]
    fn rolling_window_alignment() {
        let daily = [0.01, 0.02, 0.03, 0.04];
        let r = rolling_metrics(&daily, 3);
        assert_eq!(r.annual_return.len(), 4);
        assert!(r.annual_return[1].is_none());
        assert!((r.annual_return[2].unwrap() - 0.02 * 252.0).abs() < 1e-12);
        assert!(r.sharpe[3].unwrap() > 0.0);
    }

    #[test]
    fn historical_tail() {
        let daily: Vec<f64> = (0..100).map(|i| (i as f64 - 50.0) / 1000.0).collect();
        let (var, cvar) = historical_var_cvar(&daily, 0.05).unwrap();
        assert!(var < 0.0);
        assert!(cvar <= var);
    }
}
