//! Run journal: one JSON line per planner event.
//!
//! Lines carry a UTC timestamp and an `event` tag; the remaining fields
//! depend on the event.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use quantfolio::simulation::TailLoss;
use quantfolio::{Comparison, OptimizationOutcome, PortfolioRequest, SimulationResult, WeightSource};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize)]
pub struct WeightEntry<'a> {
    pub symbol: &'a str,
    pub weight: f64,
}

/// Journal events, serialized with an `event` tag in snake case.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event<'a> {
    RunStarted {
        command: &'a str,
        risk: f64,
        amount: f64,
        horizon_years: u32,
        num_assets: usize,
    },
    PortfolioOptimized {
        strategy: &'a str,
        weights: Vec<WeightEntry<'a>>,
        /// Reason equal weights were used, if they were.
        fallback: Option<&'a str>,
        expected_return: f64,
        volatility: f64,
        sharpe: f64,
        projected_value: f64,
    },
    SimulationCompleted {
        paths: usize,
        days: usize,
        mean_final: f64,
        median_final: f64,
        mean_max_drawdown: f64,
        tail: &'a [TailLoss],
    },
    BaselineCompared {
        baseline: &'a [String],
        baseline_return: f64,
        baseline_volatility: f64,
        optimized_return: f64,
        optimized_volatility: f64,
    },
    RunFailed {
        command: &'a str,
        error: String,
        exit_code: i32,
    },
}

impl<'a> Event<'a> {
    pub fn started(command: &'a str, request: &PortfolioRequest) -> Self {
        Event::RunStarted {
            command,
            risk: request.risk,
            amount: request.amount,
            horizon_years: request.horizon_years,
            num_assets: request.num_assets,
        }
    }

    pub fn optimized(outcome: &'a OptimizationOutcome) -> Self {
        Event::PortfolioOptimized {
            strategy: &outcome.strategy,
            weights: outcome
                .weights
                .iter()
                .map(|(symbol, weight)| WeightEntry { symbol, weight })
                .collect(),
            fallback: match &outcome.weight_source {
                WeightSource::Optimized => None,
                WeightSource::EqualWeightFallback { reason } => Some(reason.as_str()),
            },
            expected_return: outcome.metrics.expected_return,
            volatility: outcome.metrics.volatility,
            sharpe: outcome.metrics.sharpe,
            projected_value: outcome.projection.projected_value,
        }
    }

    pub fn simulated(result: &'a SimulationResult) -> Self {
        Event::SimulationCompleted {
            paths: result.simulations,
            days: result.horizon_days,
            mean_final: result.final_value.mean,
            median_final: result.final_value.median,
            mean_max_drawdown: result.max_drawdown.summary.mean,
            tail: &result.tail,
        }
    }

    pub fn compared(comparison: &'a Comparison) -> Self {
        let blended = &comparison.optimized.metrics.blended;
        Event::BaselineCompared {
            baseline: comparison.baseline.selection.symbols(),
            baseline_return: comparison.baseline.expected_return,
            baseline_volatility: comparison.baseline.volatility,
            optimized_return: blended.risky_return,
            optimized_volatility: blended.risky_volatility,
        }
    }

    pub fn failed(command: &'a str, error: &Error) -> Self {
        Event::RunFailed {
            command,
            error: error.to_string(),
            exit_code: error.exit_code(),
        }
    }
}

#[derive(Serialize)]
struct Line<'e, 'a> {
    ts: DateTime<Utc>,
    #[serde(flatten)]
    event: &'e Event<'a>,
}

/// Append-only line writer; every record is flushed.
pub struct Journal<W: Write = BufWriter<File>> {
    writer: W,
}

impl Journal {
    /// Open (or create) the journal file for appending, creating parent
    /// directories.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> Journal<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn record(&mut self, event: &Event<'_>) -> Result<()> {
        let line = Line { ts: Utc::now(), event };
        serde_json::to_writer(&mut self.writer, &line)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
