//! TOML configuration loading and validation.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use quantfolio::analysis::VarConfig;
use quantfolio::{EngineConfig, FallbackPolicy, SimulationConfig, UndersizedUniversePolicy, WeightOptimizer};

use crate::error::{Error, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub data: DataConfig,
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub simulation: SimulationSection,
    #[serde(default)]
    pub journal: JournalConfig,
}

/// Where market data lives.
#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    /// Daily returns JSON.
    pub returns: PathBuf,
    /// Optional fundamentals JSON (betas and descriptive fields).
    #[serde(default)]
    pub fundamentals: Option<PathBuf>,
    /// Restrict the universe to these symbols; empty means every column.
    #[serde(default)]
    pub universe: Vec<String>,
}

/// Which combinatorial solver backs the optimizing selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverKind {
    /// Exhaustive when the subset count is within its cap, local search otherwise.
    #[default]
    Auto,
    Exhaustive,
    LocalSearch,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    #[serde(default = "default_risk_free")]
    pub risk_free: f64,
    #[serde(default = "default_min_weight")]
    pub min_weight: f64,
    #[serde(default)]
    pub fallback: FallbackPolicy,
    #[serde(default)]
    pub undersized: UndersizedUniversePolicy,
    #[serde(default)]
    pub solver: SolverKind,
    #[serde(default = "default_max_combinations")]
    pub max_combinations: u64,
    #[serde(default = "default_restarts")]
    pub restarts: usize,
    #[serde(default = "default_solver_seed")]
    pub solver_seed: u64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default = "default_vol_penalty")]
    pub vol_penalty: f64,
    #[serde(default = "default_var_horizon")]
    pub var_horizon_days: usize,
    #[serde(default = "default_var_simulations")]
    pub var_simulations: usize,
    #[serde(default = "default_var_alpha")]
    pub var_alpha: f64,
    #[serde(default = "default_var_seed")]
    pub var_seed: u64,
    #[serde(default = "default_baseline_seed")]
    pub baseline_seed: u64,
}

fn default_risk_free() -> f64 {
    0.02
}
fn default_min_weight() -> f64 {
    0.01
}
fn default_max_combinations() -> u64 {
    2_000_000
}
fn default_restarts() -> usize {
    16
}
fn default_solver_seed() -> u64 {
    42
}
fn default_max_iterations() -> usize {
    10_000
}
fn default_tolerance() -> f64 {
    1e-9
}
fn default_vol_penalty() -> f64 {
    0.1
}
fn default_var_horizon() -> usize {
    252
}
fn default_var_simulations() -> usize {
    5_000
}
fn default_var_alpha() -> f64 {
    0.05
}
fn default_var_seed() -> u64 {
    123
}
fn default_baseline_seed() -> u64 {
    42
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            risk_free: default_risk_free(),
            min_weight: default_min_weight(),
            fallback: FallbackPolicy::default(),
            undersized: UndersizedUniversePolicy::default(),
            solver: SolverKind::default(),
            max_combinations: default_max_combinations(),
            restarts: default_restarts(),
            solver_seed: default_solver_seed(),
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
            vol_penalty: default_vol_penalty(),
            var_horizon_days: default_var_horizon(),
            var_simulations: default_var_simulations(),
            var_alpha: default_var_alpha(),
            var_seed: default_var_seed(),
            baseline_seed: default_baseline_seed(),
        }
    }
}

impl EngineSection {
    /// Engine settings this section describes.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            risk_free: self.risk_free,
            min_weight: self.min_weight,
            fallback: self.fallback,
            undersized: self.undersized,
            optimizer: WeightOptimizer {
                max_iterations: self.max_iterations,
                tolerance: self.tolerance,
                vol_penalty: self.vol_penalty,
            },
            var: VarConfig {
                horizon_days: self.var_horizon_days,
                simulations: self.var_simulations,
                alpha: self.var_alpha,
                seed: self.var_seed,
            },
            baseline_seed: self.baseline_seed,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationSection {
    #[serde(default = "default_simulations")]
    pub simulations: usize,
    #[serde(default = "default_percentiles")]
    pub percentiles: Vec<f64>,
    #[serde(default = "default_confidences")]
    pub confidences: Vec<f64>,
    #[serde(default = "default_drawdown_threshold")]
    pub drawdown_threshold: f64,
    #[serde(default = "default_sample_paths")]
    pub sample_paths: usize,
    #[serde(default = "default_simulation_seed")]
    pub seed: u64,
}

fn default_simulations() -> usize {
    1_000
}
fn default_percentiles() -> Vec<f64> {
    vec![5.0, 25.0, 50.0, 75.0, 95.0]
}
fn default_confidences() -> Vec<f64> {
    vec![0.95, 0.99]
}
fn default_drawdown_threshold() -> f64 {
    0.05
}
fn default_sample_paths() -> usize {
    10
}
fn default_simulation_seed() -> u64 {
    42
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            simulations: default_simulations(),
            percentiles: default_percentiles(),
            confidences: default_confidences(),
            drawdown_threshold: default_drawdown_threshold(),
            sample_paths: default_sample_paths(),
            seed: default_simulation_seed(),
        }
    }
}

impl SimulationSection {
    /// Simulation settings; the horizon is replaced by the request's.
    pub fn simulation_config(&self) -> SimulationConfig {
        SimulationConfig {
            simulations: self.simulations,
            percentiles: self.percentiles.clone(),
            confidences: self.confidences.clone(),
            drawdown_threshold: self.drawdown_threshold,
            sample_paths: self.sample_paths,
            seed: self.seed,
            ..SimulationConfig::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JournalConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_journal_dir")]
    pub dir: String,
    #[serde(default = "default_journal_file")]
    pub file: String,
}

fn default_true() -> bool {
    true
}
fn default_journal_dir() -> String {
    "./logs".into()
}
fn default_journal_file() -> String {
    "runs.jsonl".into()
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            dir: default_journal_dir(),
            file: default_journal_file(),
        }
    }
}

impl Config {
    /// Load config from a TOML file.
    ///
    /// Relative data paths are resolved against the config file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut config = Self::from_toml(&contents)?;
        if let Some(base) = path.parent() {
            config.data.resolve_against(base);
        }
        Ok(config)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate config invariants.
    fn validate(&self) -> Result<()> {
        if self.data.returns.as_os_str().is_empty() {
            return Err(Error::Config("data.returns must not be empty".into()));
        }
        if self.engine.max_combinations == 0 {
            return Err(Error::Config("engine.max_combinations must be > 0".into()));
        }
        if self.engine.restarts == 0 {
            return Err(Error::Config("engine.restarts must be > 0".into()));
        }
        self.engine
            .engine_config()
            .validate()
            .map_err(|e| Error::Config(format!("[engine] {e}")))?;
        // Horizon comes from the request at run time.
        self.simulation
            .simulation_config()
            .validate()
            .map_err(|e| Error::Config(format!("[simulation] {e}")))?;
        if self.journal.enabled && self.journal.file.is_empty() {
            return Err(Error::Config("journal.file must not be empty".into()));
        }
        Ok(())
    }

    /// Full path to the run journal.
    pub fn journal_path(&self) -> PathBuf {
        Path::new(&self.journal.dir).join(&self.journal.file)
    }
}

impl DataConfig {
    fn resolve_against(&mut self, base: &Path) {
        if self.returns.is_relative() {
            self.returns = base.join(&self.returns);
        }
        if let Some(f) = self.fundamentals.as_mut().filter(|f| f.is_relative()) {
            *f = base.join(&*f);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_toml() -> &'static str {
        r#"
[data]
returns = "data/returns.json"
fundamentals = "data/fundamentals.json"
universe = ["AAPL", "MSFT", "JNJ"]

[engine]
risk_free = 0.035
min_weight = 0.02
fallback = "propagate"
undersized = "take_all"
solver = "local_search"
restarts = 8

[simulation]
simulations = 500
percentiles = [10.0, 50.0, 90.0]
seed = 7

[journal]
dir = "./logs"
file = "runs.jsonl"
"#
    }

    #[test]
    fn parse_example_config() {
        let config = Config::from_toml(example_toml()).unwrap();
        assert_eq!(config.data.universe.len(), 3);
        assert_eq!(config.engine.solver, SolverKind::LocalSearch);
        assert_eq!(config.engine.restarts, 8);
        assert_eq!(config.engine.fallback, FallbackPolicy::Propagate);
        assert_eq!(config.engine.undersized, UndersizedUniversePolicy::TakeAll);
        assert_eq!(config.simulation.simulations, 500);
        assert_eq!(config.simulation.confidences, vec![0.95, 0.99]);

        let engine = config.engine.engine_config();
        assert_eq!(engine.risk_free, 0.035);
        assert_eq!(engine.var.simulations, 5_000);
    }

    #[test]
    fn only_data_section_is_required() {
        let config = Config::from_toml("[data]\nreturns = \"r.json\"\n").unwrap();
        assert_eq!(config.engine.engine_config(), EngineConfig::default());
        assert_eq!(config.engine.solver, SolverKind::Auto);
        assert!(config.journal.enabled);
        assert!(config.data.fundamentals.is_none());
    }

    #[test]
    fn missing_data_section_fails() {
        assert!(matches!(
            Config::from_toml("[engine]\nrisk_free = 0.01\n"),
            Err(Error::ConfigParse(_))
        ));
    }

    #[test]
    fn validate_catches_bad_min_weight() {
        let toml = example_toml().replace("min_weight = 0.02", "min_weight = 1.5");
        assert!(matches!(Config::from_toml(&toml), Err(Error::Config(_))));
    }

    #[test]
    fn validate_catches_bad_percentile() {
        let toml = example_toml().replace("[10.0, 50.0, 90.0]", "[10.0, 150.0]");
        assert!(matches!(Config::from_toml(&toml), Err(Error::Config(_))));
    }

    #[test]
    fn journal_path() {
        let config = Config::from_toml(example_toml()).unwrap();
        assert_eq!(config.journal_path(), PathBuf::from("./logs/runs.jsonl"));
    }

    #[test]
    fn relative_paths_resolve_against_config_dir() {
        let mut config = Config::from_toml(example_toml()).unwrap();
        config.data.resolve_against(Path::new("/srv/plans"));
        assert_eq!(config.data.returns, PathBuf::from("/srv/plans/data/returns.json"));
        assert_eq!(
            config.data.fundamentals,
            Some(PathBuf::from("/srv/plans/data/fundamentals.json"))
        );
    }
}
