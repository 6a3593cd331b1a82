//! Rolling-origin backtesting
//!
//! The model is refitted at checkpoints one day apart, each time on all
//! history before the checkpoint, and its forecast for the following hours
//! is scored against what was actually measured. Errors are pooled over all
//! checkpoints before MAE and RMSE are taken. Backtests never touch the model
//! cache.

use crate::config::ForecastSettings;
use crate::data::{MeasurementSeries, SeriesPreparer};
use crate::error::{ForecastError, Result};
use crate::forecaster::fit_with_budget;
use crate::metrics::PooledErrors;
use crate::models::{Algorithm, DefaultTrainer, ModelTrainer, TrainedForecastModel, ONE_WEEK_HOURS};
use crate::repository::SeriesRepository;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Hours between consecutive checkpoints
pub const CHECKPOINT_STEP_HOURS: usize = 24;

/// Outcome of a rolling backtest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub city: String,
    pub days: u32,
    pub horizon_hours: usize,
    pub mae: f64,
    pub rmse: f64,
    /// Checkpoints attempted
    pub n_checkpoints: usize,
    /// Forecast/actual pairs scored
    pub n_predictions: usize,
    /// Checkpoints skipped because the fit or forecast failed
    pub failed_checkpoints: usize,
    pub algorithm: Algorithm,
}

/// Training cut-offs for a series of `len` hours.
///
/// The first cut leaves at least a week (or the model's own minimum) of
/// history; the last leaves `horizon_hours` of truth after it.
pub fn checkpoints(len: usize, horizon_hours: usize, algorithm: Algorithm) -> Vec<usize> {
    let start = ONE_WEEK_HOURS.max(algorithm.min_training_hours());
    let end = len.saturating_sub(horizon_hours);
    (start..end).step_by(CHECKPOINT_STEP_HOURS).collect()
}

/// Scores a model family on past data
pub struct Backtester {
    repository: Arc<dyn SeriesRepository>,
    trainer: Arc<dyn ModelTrainer>,
    settings: ForecastSettings,
}

impl Backtester {
    pub fn new(repository: Arc<dyn SeriesRepository>, settings: ForecastSettings) -> Self {
        Self {
            repository,
            trainer: Arc::new(DefaultTrainer),
            settings,
        }
    }

    pub fn with_trainer(mut self, trainer: Arc<dyn ModelTrainer>) -> Self {
        self.trainer = trainer;
        self
    }

    /// Backtest `total_days` of history for `city` at `horizon_hours`
    pub fn backtest_roll(
        &self,
        city: &str,
        total_days: u32,
        horizon_hours: usize,
    ) -> Result<BacktestResult> {
        if horizon_hours == 0 {
            return Err(ForecastError::InvalidParameter(
                "horizon_hours must be at least 1".to_string(),
            ));
        }
        let series = SeriesPreparer::load(self.repository.as_ref(), city, total_days)?;
        self.backtest_series(&series, total_days, horizon_hours)
    }

    /// Backtest an already prepared series
    pub fn backtest_series(
        &self,
        series: &MeasurementSeries,
        total_days: u32,
        horizon_hours: usize,
    ) -> Result<BacktestResult> {
        let city = series.city();
        let algorithm = self.settings.algorithm;
        let cuts = checkpoints(series.len(), horizon_hours, algorithm);
        if cuts.is_empty() {
            return Err(ForecastError::InsufficientData {
                city: city.to_string(),
                needed_hours: ONE_WEEK_HOURS.max(algorithm.min_training_hours()) + horizon_hours,
                available_hours: series.len(),
            });
        }

        log::info!(
            "backtesting city={} algorithm={} hours={} checkpoints={}",
            city,
            algorithm,
            series.len(),
            cuts.len()
        );

        let started = Instant::now();
        let budget = self.settings.backtest_timeout();
        let mut pooled = PooledErrors::new();
        let mut failed = 0;

        for (index, &cut) in cuts.iter().enumerate() {
            if let Some(budget) = budget {
                if started.elapsed() > budget {
                    return Err(ForecastError::Timeout {
                        operation: format!("backtest for {}", city),
                        budget,
                    });
                }
            }

            let end = (cut + horizon_hours).min(series.len());
            let predicted = fit_with_budget(
                &self.trainer,
                algorithm,
                series.prefix(cut),
                self.settings.fit_options(),
                self.settings.fit_timeout(),
            )
            .and_then(|model| model.forecast(horizon_hours));

            match predicted {
                Ok(bands) => {
                    let yhat: Vec<f64> = bands.iter().map(|b| b.mean).collect();
                    pooled.extend(&yhat, &series.values()[cut..end]);
                }
                Err(err) => {
                    failed += 1;
                    log::warn!(
                        "skipping checkpoint city={} algorithm={} checkpoint={} cut={}: {}",
                        city,
                        algorithm,
                        index,
                        cut,
                        err
                    );
                }
            }
        }

        if pooled.is_empty() {
            return Err(ForecastError::BacktestEmpty {
                city: city.to_string(),
                checkpoints: cuts.len(),
            });
        }

        let accuracy = pooled.accuracy()?;
        Ok(BacktestResult {
            city: city.to_string(),
            days: total_days,
            horizon_hours,
            mae: accuracy.mae,
            rmse: accuracy.rmse,
            n_checkpoints: cuts.len(),
            n_predictions: pooled.len(),
            failed_checkpoints: failed,
            algorithm,
        })
    }
}
