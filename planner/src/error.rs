//! Error types for the planner.

use std::path::PathBuf;

/// All errors that can occur during a planner run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("failed to read {path}: {source}")]
    InputRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    InputParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid market data in {path}: {source}")]
    MarketData {
        path: PathBuf,
        source: quantfolio::Error,
    },

    #[error(transparent)]
    Engine(#[from] quantfolio::Error),

    #[error("failed to serialize output: {0}")]
    Output(#[from] serde_json::Error),

    #[error("journal error: {0}")]
    Journal(#[from] std::io::Error),
}

impl Error {
    /// Process exit code for this error.
    ///
    /// Engine selection and data failures (including malformed market data
    /// files) exit with 2, optimization failures with 3, simulation failures
    /// with 4; everything else with 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Engine(quantfolio::Error::Selection(_) | quantfolio::Error::Data(_)) => 2,
            Error::MarketData { .. } => 2,
            Error::Engine(quantfolio::Error::Optimization(_)) => 3,
            Error::Engine(quantfolio::Error::Simulation(_)) => 4,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
