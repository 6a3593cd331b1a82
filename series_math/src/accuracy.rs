//! Accuracy measures for pooled forecast errors

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

/// Forecast accuracy metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastAccuracy {
    /// Mean Absolute Error
    pub mae: f64,
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
}

/// Calculate accuracy metrics for a forecast vs actual values
pub fn forecast_accuracy(forecast: &[f64], actual: &[f64]) -> Result<ForecastAccuracy> {
    if forecast.len() != actual.len() || forecast.is_empty() {
        return Err(MathError::InvalidInput(
            "Forecast and actual values must have the same non-zero length".to_string(),
        ));
    }

    let n = forecast.len() as f64;
    let errors: Vec<f64> = forecast
        .iter()
        .zip(actual.iter())
        .map(|(&f, &a)| a - f)
        .collect();

    let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;
    let mse = errors.iter().map(|e| e.powi(2)).sum::<f64>() / n;

    Ok(ForecastAccuracy {
        mae,
        mse,
        rmse: mse.sqrt(),
    })
}

impl std::fmt::Display for ForecastAccuracy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Forecast Accuracy Metrics:")?;
        writeln!(f, "  MAE:   {:.4}", self.mae)?;
        writeln!(f, "  MSE:   {:.4}", self.mse)?;
        writeln!(f, "  RMSE:  {:.4}", self.rmse)?;
        Ok(())
    }
}
