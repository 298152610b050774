//! CLI entry point for the quantfolio planner.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use serde::Serialize;

use quantfolio_planner::config::Config;
use quantfolio_planner::error::{Error, Result};
use quantfolio_planner::report::{ComparisonReport, OutcomeReport, SimulationSummary, StatsSummary};
use quantfolio_planner::run::{Planner, load_request};

#[derive(Parser)]
#[command(name = "planner")]
#[command(about = "Portfolio planner: select, weight, project and simulate")]
#[command(version)]
struct Cli {
    /// Path to config.toml
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Print results as JSON instead of reports
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Select and weight a portfolio for a request
    Optimize {
        /// Path to request.json
        request: PathBuf,
    },

    /// Optimize, then simulate value paths over the request horizon
    Simulate {
        /// Path to request.json
        request: PathBuf,
    },

    /// Optimize and compare against the baseline reference portfolio
    Compare {
        /// Path to request.json
        request: PathBuf,
    },

    /// Descriptive statistics of the configured universe
    Stats {
        /// Rolling window in trading days
        #[arg(long, default_value_t = 63)]
        window: usize,

        /// Tail probability for historical VaR/CVaR
        #[arg(long, default_value_t = 0.05)]
        alpha: f64,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Optimize { .. } => "optimize",
            Command::Simulate { .. } => "simulate",
            Command::Compare { .. } => "compare",
            Command::Stats { .. } => "stats",
        }
    }
}

fn emit<T: Serialize>(json: bool, value: &T, report: impl std::fmt::Display) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print!("{report}");
    }
    Ok(())
}

fn execute(planner: &mut Planner, command: &Command, json: bool) -> Result<()> {
    match command {
        Command::Optimize { request } => {
            let request = load_request(request)?;
            let outcome = planner.optimize(&request)?;
            emit(json, &outcome, OutcomeReport(&outcome))
        }
        Command::Simulate { request } => {
            let request = load_request(request)?;
            let report = planner.simulate(&request)?;
            emit(json, &report, SimulationSummary(&report))
        }
        Command::Compare { request } => {
            let request = load_request(request)?;
            let comparison = planner.compare(&request)?;
            emit(json, &comparison, ComparisonReport(&comparison))
        }
        Command::Stats { window, alpha } => {
            let stats = planner.stats(*window, *alpha)?;
            emit(json, &stats, StatsSummary(&stats))
        }
    }
}

fn fail(e: &Error) -> ! {
    eprintln!("Error: {e}");
    process::exit(e.exit_code());
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => fail(&e),
    };

    let mut planner = match Planner::new(config) {
        Ok(p) => p,
        Err(e) => fail(&e),
    };

    if let Err(e) = execute(&mut planner, &cli.command, cli.json) {
        planner.record_failure(cli.command.name(), &e);
        fail(&e);
    }
}
