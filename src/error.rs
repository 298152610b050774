//! Typed error taxonomy for the engine.
//!
//! Each component validates its own inputs and fails fast with one of the
//! kinds below instead of producing NaN/Inf results.

/// Asset selection failures.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum SelectionError {
    #[error("universe has {universe} assets but {k} were requested")]
    UniverseTooSmall { universe: usize, k: usize },

    #[error("number of assets to select must be at least 1")]
    ZeroAssets,

    #[error("solver returned an infeasible selection: {0}")]
    InfeasibleSolution(String),

    #[error("solver failed: {0}")]
    Solver(String),
}

/// Weight optimisation failures.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum OptimizationError {
    #[error("weight optimizer did not converge within {iterations} iterations")]
    NotConverged { iterations: usize },

    #[error("minimum weight {min_weight} is infeasible for {assets} assets")]
    InfeasibleFloor { min_weight: f64, assets: usize },

    #[error("weight optimizer produced a non-finite objective")]
    NonFinite,

    #[error("cannot optimize weights for an empty selection")]
    EmptySelection,
}

/// Input data failures: malformed return matrices, mismatched dimensions,
/// unusable covariance.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum DataError {
    #[error("{what}: expected length {expected}, got {got}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("{0} contains non-finite values")]
    NonFinite(&'static str),

    #[error("{0} is empty")]
    Empty(&'static str),

    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),

    #[error("asset {0} has fewer than two observations")]
    InsufficientObservations(String),

    #[error("dates are not strictly increasing at row {row}")]
    DatesNotIncreasing { row: usize },

    #[error("selection indices are not strictly increasing at position {position}")]
    IndicesNotIncreasing { position: usize },

    #[error("covariance matrix is not symmetric")]
    AsymmetricCovariance,

    #[error("covariance matrix is not positive semi-definite (min eigenvalue {min_eigenvalue})")]
    NotPositiveSemiDefinite { min_eigenvalue: f64 },

    #[error("covariance matrix is singular beyond pseudo-inverse tolerance")]
    SingularCovariance,

    #[error("covariance matrix has zero variance; volatility target undefined")]
    DegenerateCovariance,

    #[error("{field} must be in {range}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        range: &'static str,
    },
}

/// Simulation parameter failures.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum SimulationError {
    #[error("horizon must be at least one day")]
    ZeroHorizon,

    #[error("simulation count must be at least one")]
    ZeroSimulations,

    #[error("initial investment must be positive and finite, got {0}")]
    InvalidInvestment(f64),

    #[error("percentile must be in [0, 100], got {0}")]
    InvalidPercentile(f64),

    #[error("confidence level must be in (0, 1), got {0}")]
    InvalidConfidence(f64),

    #[error("drawdown threshold must be in [0, 1), got {0}")]
    InvalidThreshold(f64),
}

/// Any engine error.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Error {
    #[error("selection error: {0}")]
    Selection(#[from] SelectionError),

    #[error("optimization error: {0}")]
    Optimization(#[from] OptimizationError),

    #[error("data error: {0}")]
    Data(#[from] DataError),

    #[error("simulation error: {0}")]
    Simulation(#[from] SimulationError),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(
            format!("{}", SelectionError::UniverseTooSmall { universe: 3, k: 5 }),
            "universe has 3 assets but 5 were requested"
        );
        assert_eq!(
            format!("{}", SimulationError::ZeroHorizon),
            "horizon must be at least one day"
        );
    }

    #[test]
    fn umbrella_wraps_kinds() {
        let err: Error = OptimizationError::NotConverged { iterations: 10 }.into();
        assert!(matches!(err, Error::Optimization(_)));
        assert!(err.to_string().starts_with("optimization error"));
    }

    #[test]
    fn is_error() {
        let err: Box<dyn std::error::Error> = Box::new(DataError::Empty("universe"));
        assert!(err.to_string().contains("universe"));
    }
}
