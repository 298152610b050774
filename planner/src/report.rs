//! Human-readable reports for terminal output.

use std::fmt;

use quantfolio::{Comparison, OptimizationOutcome, WeightSource};

use crate::run::{SimulationReport, StatsReport};

fn pct(x: f64) -> String {
    format!("{:.2}%", x * 100.0)
}

fn write_allocation(f: &mut fmt::Formatter<'_>, outcome: &OptimizationOutcome) -> fmt::Result {
    writeln!(f, "ALLOCATION:")?;
    writeln!(
        f,
        "  {:8} {:>8} {:>14} {:>9} {:>9} {:>7} {:>14}",
        "Symbol", "Weight", "Invested", "Return", "Vol", "Sharpe", "Returned"
    )?;
    for row in &outcome.allocation {
        writeln!(
            f,
            "  {:8} {:>8} {:>14.2} {:>9} {:>9} {:>7.2} {:>14.2}",
            row.symbol,
            pct(row.weight),
            row.investment,
            pct(row.annual_return),
            pct(row.volatility),
            row.sharpe,
            row.returned_amount,
        )?;
    }
    Ok(())
}

/// Selection, weights, metrics and projection of one outcome.
pub struct OutcomeReport<'a>(pub &'a OptimizationOutcome);

impl fmt::Display for OutcomeReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = self.0;
        writeln!(
            f,
            "PORTFOLIO ({} selector, risk {:.2}, {} assets{}):",
            o.strategy,
            o.request.risk,
            o.selection.len(),
            if o.selection.is_best_effort() { ", best effort" } else { "" }
        )?;
        if let WeightSource::EqualWeightFallback { reason } = &o.weight_source {
            writeln!(f, "  [WARN] equal weights used: {reason}")?;
        }
        write_allocation(f, o)?;
        writeln!(f)?;
        writeln!(f, "{}", o.metrics)?;
        writeln!(f)?;
        writeln!(f, "{}", o.projection)
    }
}

/// Outcome followed by the simulation summary.
pub struct SimulationSummary<'a>(pub &'a SimulationReport);

impl fmt::Display for SimulationSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.0;
        write!(f, "{}", OutcomeReport(&r.outcome))?;
        writeln!(f)?;
        writeln!(f, "{}", r.simulation)?;
        if let Some(u) = &r.simulation.underwater_period {
            writeln!(f, "  Mean underwater: {:>11.1} days", u.mean)?;
        }
        writeln!(
            f,
            "  Paths with drawdown > threshold: {} of {}",
            r.simulation.paths_with_drawdown, r.simulation.simulations
        )
    }
}

/// Optimized and baseline portfolios side by side.
pub struct ComparisonReport<'a>(pub &'a Comparison);

impl fmt::Display for ComparisonReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = self.0;
        write!(f, "{}", OutcomeReport(&c.optimized))?;
        writeln!(f)?;
        writeln!(f, "COMPARISON:")?;
        writeln!(f, "  {:12} {:>10} {:>10} {:>8}  Assets", "", "Return", "Vol", "Ratio")?;
        let blended = &c.optimized.metrics.blended;
        let ratio = if blended.risky_volatility > 0.0 {
            blended.risky_return / blended.risky_volatility
        } else {
            0.0
        };
        writeln!(
            f,
            "  {:12} {:>10} {:>10} {:>8.2}  {}",
            "optimized",
            pct(blended.risky_return),
            pct(blended.risky_volatility),
            ratio,
            c.optimized.selection.symbols().join(", ")
        )?;
        writeln!(
            f,
            "  {:12} {:>10} {:>10} {:>8.2}  {}",
            "baseline",
            pct(c.baseline.expected_return),
            pct(c.baseline.volatility),
            c.baseline.sharpe,
            c.baseline.selection.symbols().join(", ")
        )?;
        writeln!(
            f,
            "  Projected value: {:.2} (optimized) vs {:.2} (baseline)",
            c.optimized.projection.projected_value, c.baseline_projection.projected_value
        )
    }
}

/// Per-asset table, historical tails and correlations.
pub struct StatsSummary<'a>(pub &'a StatsReport);

impl fmt::Display for StatsSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.0;
        writeln!(f, "ASSETS:")?;
        writeln!(
            f,
            "  {:8} {:>9} {:>9} {:>7} {:>8} {:>6} {:>6} {:>6} {:>9}",
            "Symbol", "Return", "Vol", "Sharpe", "MaxDD", "Skew", "Kurt", "Obs", "Rolling"
        )?;
        for (a, rolling) in s.assets.iter().zip(&s.latest_rolling_sharpe) {
            let rolling = rolling.map_or_else(|| "n/a".to_string(), |r| format!("{r:.2}"));
            writeln!(
                f,
                "  {:8} {:>9} {:>9} {:>7.2} {:>8} {:>6.2} {:>6.2} {:>6} {:>9}",
                a.symbol,
                pct(a.annual_return),
                pct(a.annual_volatility),
                a.sharpe,
                pct(a.max_drawdown),
                a.skewness,
                a.kurtosis,
                a.observations,
                rolling,
            )?;
        }

        writeln!(f, "\nHISTORICAL DAILY TAIL (alpha {:.2}):", s.alpha)?;
        for t in &s.tails {
            writeln!(f, "  {:8} VaR {:>8}  CVaR {:>8}", t.symbol, pct(t.var), pct(t.cvar))?;
        }

        writeln!(f, "\nCORRELATION:")?;
        write!(f, "  {:8}", "")?;
        for a in &s.assets {
            write!(f, " {:>8}", a.symbol)?;
        }
        writeln!(f)?;
        for (a, row) in s.assets.iter().zip(&s.correlation) {
            write!(f, "  {:8}", a.symbol)?;
            for c in row {
                if c.is_finite() {
                    write!(f, " {c:>8.2}")?;
                } else {
                    write!(f, " {:>8}", "n/a")?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
