//! # Series Math
//!
//! Numerical building blocks for fitting and evaluating hourly series models.
//! This crate provides the optimiser, linear solver, gap filling and
//! accuracy measures used by the forecasting crate.

use thiserror::Error;

pub mod accuracy;
pub mod distribution;
pub mod fourier;
pub mod interpolation;
pub mod linalg;
pub mod optimization;

/// Errors that can occur in numerical calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),

    #[error("Optimisation did not converge after {iterations} iterations (objective {objective})")]
    NotConverged { iterations: usize, objective: f64 },
}

/// Result type for numerical operations
pub type Result<T> = std::result::Result<T, MathError>;
