//! Metrics for evaluating forecast performance

use crate::error::{ForecastError, Result};
use serde::Serialize;
use series_math::accuracy::{forecast_accuracy, ForecastAccuracy};

/// Forecast and actual values pooled across backtest checkpoints
#[derive(Debug, Clone, Default, Serialize)]
pub struct PooledErrors {
    forecast: Vec<f64>,
    actual: Vec<f64>,
}

impl PooledErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one checkpoint, truncated to the shorter of the two slices.
    ///
    /// Returns the number of pairs added.
    pub fn extend(&mut self, forecast: &[f64], actual: &[f64]) -> usize {
        let n = forecast.len().min(actual.len());
        self.forecast.extend_from_slice(&forecast[..n]);
        self.actual.extend_from_slice(&actual[..n]);
        n
    }

    pub fn len(&self) -> usize {
        self.forecast.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forecast.is_empty()
    }

    /// Accuracy over every pooled pair
    pub fn accuracy(&self) -> Result<ForecastAccuracy> {
        if self.is_empty() {
            return Err(ForecastError::InvalidParameter(
                "No predictions to evaluate".to_string(),
            ));
        }
        forecast_accuracy(&self.forecast, &self.actual)
            .map_err(|e| ForecastError::InvalidParameter(e.to_string()))
    }
}
