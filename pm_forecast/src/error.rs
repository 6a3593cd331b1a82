//! Error types for the pm_forecast crate

use crate::models::Algorithm;
use series_math::MathError;
use std::time::Duration;
use thiserror::Error;

/// Custom error types for the pm_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// The measurement store returned nothing usable for the window
    #[error("No data found for {city} in last {days} days. Run ingestion first.")]
    NoData { city: String, days: u32 },

    /// Model fitting failed; the numerical cause is attached
    #[error("Model fit failed for {algorithm}: {source}")]
    ModelFit {
        algorithm: Algorithm,
        #[source]
        source: MathError,
    },

    /// Not enough history to form a single backtest checkpoint
    #[error(
        "Not enough data for backtesting {city}. Need at least {needed_hours} hours, got {available_hours}"
    )]
    InsufficientData {
        city: String,
        needed_hours: usize,
        available_hours: usize,
    },

    /// Every backtest checkpoint failed
    #[error("Backtest failed: no valid predictions generated for {city} across {checkpoints} checkpoints")]
    BacktestEmpty { city: String, checkpoints: usize },

    /// A wall-clock budget was exhausted
    #[error("{operation} exceeded its budget of {budget:?}")]
    Timeout { operation: String, budget: Duration },

    /// A helper thread died before reporting a result
    #[error("{0} worker stopped without a result")]
    WorkerLost(String),

    /// A model artifact could not be written
    #[error("Model cache error: {0}")]
    Cache(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The measurement store could not be read
    #[error("Repository error: {0}")]
    Repository(String),

    /// Settings could not be loaded
    #[error("Config error: {0}")]
    Config(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<csv::Error> for ForecastError {
    fn from(err: csv::Error) -> Self {
        ForecastError::Repository(err.to_string())
    }
}

impl From<serde_json::Error> for ForecastError {
    fn from(err: serde_json::Error) -> Self {
        ForecastError::Config(err.to_string())
    }
}
