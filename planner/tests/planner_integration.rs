//! Integration tests for planner workflows over files in a temp directory.

use std::fs;
use std::path::{Path, PathBuf};

use quantfolio::{PortfolioRequest, WeightSource};
use quantfolio_planner::config::Config;
use quantfolio_planner::data::MarketDataCache;
use quantfolio_planner::error::Error;
use quantfolio_planner::report::{ComparisonReport, OutcomeReport, SimulationSummary, StatsSummary};
use quantfolio_planner::run::{Planner, load_request};

const SYMBOLS: [&str; 6] = ["AAPL", "JNJ", "MSFT", "NVDA", "PG", "XOM"];

/// Deterministic daily returns for [`SYMBOLS`] in the planner's JSON format.
fn returns_json(days: usize) -> String {
    let dates: Vec<String> = (0..days)
        .map(|d| {
            let date = chrono::NaiveDate::from_ymd_opt(2023, 1, 2).unwrap() + chrono::Days::new(d as u64);
            format!("\"{date}\"")
        })
        .collect();

    // Simple deterministic PRNG (xorshift32)
    let mut rng_state: u32 = 99;
    let columns: Vec<String> = SYMBOLS
        .iter()
        .enumerate()
        .map(|(j, sym)| {
            let values: Vec<String> = (0..days)
                .map(|t| {
                    rng_state ^= rng_state << 13;
                    rng_state ^= rng_state >> 17;
                    rng_state ^= rng_state << 5;
                    if j == 0 && t == 3 {
                        return "null".to_string();
                    }
                    let noise = (rng_state % 2001) as f64 / 1000.0 - 1.0;
                    format!("{:.6}", 0.0003 * (j as f64 + 1.0) + 0.012 * noise)
                })
                .collect();
            format!("\"{sym}\": [{}]", values.join(", "))
        })
        .collect();

    format!(
        "{{ \"dates\": [{}], \"returns\": {{ {} }} }}",
        dates.join(", "),
        columns.join(", ")
    )
}

struct Fixture {
    dir: tempfile::TempDir,
}

impl Fixture {
    fn new(extra_engine: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("returns.json"), returns_json(160)).unwrap();
        fs::write(
            dir.path().join("fundamentals.json"),
            r#"{ "AAPL": { "beta": 1.2 }, "MSFT": { "beta": 0.9 }, "XOM": { "beta": 0.7, "price": 110.0 } }"#,
        )
        .unwrap();
        let journal_dir = dir.path().join("logs");
        let config = format!(
            r#"
[data]
returns = "returns.json"
fundamentals = "fundamentals.json"

[engine]
risk_free = 0.03
{extra_engine}

[simulation]
simulations = 150
sample_paths = 3

[journal]
dir = "{}"
"#,
            journal_dir.display()
        );
        fs::write(dir.path().join("config.toml"), config).unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn planner(&self) -> Planner {
        Planner::new(Config::load(&self.path("config.toml")).unwrap()).unwrap()
    }

    fn write_request(&self, json: &str) -> PathBuf {
        let path = self.path("request.json");
        fs::write(&path, json).unwrap();
        path
    }

    fn journal_lines(&self) -> Vec<serde_json::Value> {
        fs::read_to_string(self.path("logs").join("runs.jsonl"))
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }
}

fn request(num_assets: usize) -> PortfolioRequest {
    PortfolioRequest {
        risk: 0.6,
        amount: 25_000.0,
        horizon_years: 2,
        num_assets,
    }
}

// ============================================================================
// Workflows
// ============================================================================

#[test]
fn optimize_journals_and_reports() {
    let fx = Fixture::new("");
    let mut planner = fx.planner();
    let outcome = planner.optimize(&request(3)).unwrap();

    assert_eq!(outcome.selection.len(), 3);
    assert_eq!(outcome.weight_source, WeightSource::Optimized);
    assert!(outcome.metrics.sortino.is_some());

    let text = OutcomeReport(&outcome).to_string();
    assert!(text.contains("ALLOCATION:"));
    assert!(text.contains("Portfolio Metrics"));

    let events: Vec<String> = fx
        .journal_lines()
        .iter()
        .map(|l| l["event"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(events, vec!["run_started", "portfolio_optimized"]);
}

#[test]
fn simulate_uses_request_horizon() {
    let fx = Fixture::new("solver = \"local_search\"");
    let mut planner = fx.planner();
    let report = planner.simulate(&request(2)).unwrap();

    assert_eq!(report.simulation.horizon_days, 504);
    assert_eq!(report.simulation.simulations, 150);
    assert_eq!(report.simulation.sample_paths.len(), 3);
    assert!(SimulationSummary(&report).to_string().contains("Simulation:"));
    assert_eq!(fx.journal_lines().last().unwrap()["event"], "simulation_completed");
}

#[test]
fn compare_includes_baseline() {
    let fx = Fixture::new("");
    let mut planner = fx.planner();
    let cmp = planner.compare(&request(2)).unwrap();

    assert_eq!(cmp.baseline.selection.len(), 2);
    let text = ComparisonReport(&cmp).to_string();
    assert!(text.contains("baseline"));
    assert!(text.contains("optimized"));
}

#[test]
fn stats_cover_every_symbol() {
    let fx = Fixture::new("");
    let mut planner = fx.planner();
    let stats = planner.stats(20, 0.05).unwrap();

    assert_eq!(stats.assets.len(), SYMBOLS.len());
    assert_eq!(stats.correlation.len(), SYMBOLS.len());
    assert!((stats.correlation[0][0] - 1.0).abs() < 1e-12);
    assert!(stats.tails.iter().all(|t| t.cvar <= t.var));
    assert!(stats.latest_rolling_sharpe.iter().all(Option::is_some));
    assert!(StatsSummary(&stats).to_string().contains("CORRELATION:"));
    assert!(planner.stats(20, 1.5).is_err());
}

#[test]
fn beta_comes_from_fundamentals() {
    let fx = Fixture::new("");
    let mut planner = fx.planner();
    let outcome = planner.optimize(&request(6)).unwrap();
    // AAPL, MSFT and XOM have betas; the weighted mean lies between them.
    assert!(outcome.projection.beta >= 0.7 && outcome.projection.beta <= 1.2);
}

// ============================================================================
// Cache
// ============================================================================

#[test]
fn cache_reuses_until_invalidated() {
    let fx = Fixture::new("");
    let path = fx.path("returns.json");
    let mut cache = MarketDataCache::new();

    let first = cache.get_or_load(&path).unwrap();
    let second = cache.get_or_load(&path).unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));
    assert_eq!(cache.len(), 1);

    fs::write(&path, returns_json(40)).unwrap();
    assert_eq!(cache.get_or_load(&path).unwrap().returns.len(), 160);

    assert!(cache.invalidate(&path));
    assert!(!cache.contains(&path));
    assert_eq!(cache.get_or_load(&path).unwrap().returns.len(), 40);

    cache.get_or_load_fundamentals(&fx.path("fundamentals.json")).unwrap();
    assert_eq!(cache.len(), 2);
    cache.clear();
    assert!(cache.is_empty());
}

#[test]
fn planner_loads_data_once_per_session() {
    let fx = Fixture::new("");
    let mut planner = fx.planner();
    planner.optimize(&request(2)).unwrap();
    assert_eq!(planner.cache().len(), 2);
    planner.compare(&request(2)).unwrap();
    assert_eq!(planner.cache().len(), 2);
}

// ============================================================================
// Failures and exit codes
// ============================================================================

#[test]
fn request_file_is_validated() {
    let fx = Fixture::new("");
    let ok = fx.write_request(r#"{ "risk": 0.5, "amount": 1000.0, "horizon_years": 5, "num_assets": 2 }"#);
    assert_eq!(load_request(&ok).unwrap().num_assets, 2);

    let bad = fx.write_request(r#"{ "risk": 1.5, "amount": 1000.0, "horizon_years": 5, "num_assets": 2 }"#);
    let err = load_request(&bad).unwrap_err();
    assert_eq!(err.exit_code(), 2);

    let garbled = fx.write_request("{ not json");
    assert!(matches!(load_request(&garbled), Err(Error::InputParse { .. })));
    assert!(matches!(
        load_request(Path::new("/nonexistent/request.json")),
        Err(Error::InputRead { .. })
    ));
}

#[test]
fn oversized_request_exits_with_selection_code() {
    let fx = Fixture::new("");
    let mut planner = fx.planner();
    let err = planner.optimize(&request(10)).unwrap_err();
    assert_eq!(err.exit_code(), 2);

    planner.record_failure("optimize", &err);
    let last = fx.journal_lines().pop().unwrap();
    assert_eq!(last["event"], "run_failed");
    assert_eq!(last["exit_code"], 2);
}

#[test]
fn take_all_policy_returns_best_effort() {
    let fx = Fixture::new("undersized = \"take_all\"");
    let mut planner = fx.planner();
    let outcome = planner.optimize(&request(10)).unwrap();
    assert!(outcome.selection.is_best_effort());
    assert_eq!(outcome.selection.len(), SYMBOLS.len());
}

#[test]
fn malformed_returns_file_is_a_data_error() {
    let fx = Fixture::new("");
    fs::write(
        fx.path("returns.json"),
        r#"{ "dates": ["2024-01-03", "2024-01-02"], "returns": { "A": [0.01, 0.02] } }"#,
    )
    .unwrap();
    let mut planner = fx.planner();
    let err = planner.optimize(&request(1)).unwrap_err();
    assert!(matches!(err, Error::MarketData { .. }));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn weights_and_selection_json_are_validated() {
    let fx = Fixture::new("");
    let mut planner = fx.planner();
    let outcome = planner.optimize(&request(3)).unwrap();

    let weights: quantfolio::Weights = serde_json::from_str(&serde_json::to_string(&outcome.weights).unwrap()).unwrap();
    assert_eq!(weights.symbols(), outcome.weights.symbols());
    for (a, b) in weights.values().iter().zip(outcome.weights.values()) {
        assert!((a - b).abs() < 1e-12);
    }
    let selection: quantfolio::Selection =
        serde_json::from_str(&serde_json::to_string(&outcome.selection).unwrap()).unwrap();
    assert_eq!(selection, outcome.selection);

    let broken = r#"{"symbols":["A","B"],"values":[5.0]}"#;
    assert!(serde_json::from_str::<quantfolio::Weights>(broken).is_err());
}
