//! Single-city forecasting with model reuse
//!
//! A forecast either reuses the cached model for the city or trains a fresh
//! one on the requested window and stores it for later calls.

use crate::cache::{ModelArtifact, ModelCache};
use crate::config::ForecastSettings;
use crate::data::{MeasurementSeries, SeriesPreparer};
use crate::error::{ForecastError, Result};
use crate::models::{
    Algorithm, DefaultTrainer, FitOptions, FittedModel, ModelTrainer, TrainedForecastModel,
};
use crate::repository::SeriesRepository;
use crate::utils::{future_timestamps, run_with_budget};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Hours per forecast day
pub const HOURS_PER_DAY: usize = 24;

/// One forecast hour
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub ts: DateTime<Utc>,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
}

/// Forecast for one city
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub city: String,
    pub horizon_hours: usize,
    pub series: Vec<ForecastPoint>,
    pub algorithm: Algorithm,
    /// Whether the model came from the cache rather than a fresh fit
    pub from_cache: bool,
}

impl ForecastResult {
    /// Mean of the point forecasts, `None` for an empty series
    pub fn mean_yhat(&self) -> Option<f64> {
        if self.series.is_empty() {
            return None;
        }
        Some(self.series.iter().map(|p| p.yhat).sum::<f64>() / self.series.len() as f64)
    }
}

/// Fit a model on a helper thread under `budget`
pub(crate) fn fit_with_budget(
    trainer: &Arc<dyn ModelTrainer>,
    algorithm: Algorithm,
    series: MeasurementSeries,
    options: FitOptions,
    budget: Option<Duration>,
) -> Result<FittedModel> {
    let trainer = Arc::clone(trainer);
    let operation = format!("{} fit for {}", algorithm, series.city());
    run_with_budget(&operation, budget, move || {
        trainer.fit(algorithm, &series, &options)
    })
}

/// Produces horizon forecasts for one city at a time
pub struct Forecaster {
    repository: Arc<dyn SeriesRepository>,
    cache: Arc<ModelCache>,
    trainer: Arc<dyn ModelTrainer>,
    settings: ForecastSettings,
}

impl Forecaster {
    pub fn new(
        repository: Arc<dyn SeriesRepository>,
        cache: Arc<ModelCache>,
        settings: ForecastSettings,
    ) -> Self {
        Self {
            repository,
            cache,
            trainer: Arc::new(DefaultTrainer),
            settings,
        }
    }

    /// Replace the model trainer
    pub fn with_trainer(mut self, trainer: Arc<dyn ModelTrainer>) -> Self {
        self.trainer = trainer;
        self
    }

    pub fn settings(&self) -> &ForecastSettings {
        &self.settings
    }

    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    pub fn algorithm(&self) -> Algorithm {
        self.settings.algorithm
    }

    /// Forecast `horizon_days * 24` hours for `city`.
    ///
    /// With `use_cache` an acceptable stored model is reused. Otherwise the
    /// last `train_days` of history are fitted and the model is stored even
    /// though it was not read from the cache.
    pub fn forecast_city(
        &self,
        city: &str,
        horizon_days: u32,
        train_days: u32,
        use_cache: bool,
    ) -> Result<ForecastResult> {
        if horizon_days < 1 {
            return Err(ForecastError::InvalidParameter(
                "horizon_days must be at least 1".to_string(),
            ));
        }
        if train_days < 1 {
            return Err(ForecastError::InvalidParameter(
                "train_days must be at least 1".to_string(),
            ));
        }

        let algorithm = self.settings.algorithm;
        let cached = if use_cache {
            self.cache.lookup(city, algorithm, train_days)
        } else {
            None
        };

        let (model, from_cache) = match cached {
            Some(artifact) => {
                log::debug!("using cached model city={} algorithm={}", city, algorithm);
                (artifact.model, true)
            }
            None => (self.train_and_store(city, train_days)?, false),
        };

        let steps = horizon_days as usize * HOURS_PER_DAY;
        let bands = model.forecast(steps)?;
        let series = future_timestamps(model.last_timestamp(), steps)
            .into_iter()
            .zip(bands)
            .map(|(ts, band)| ForecastPoint {
                ts,
                yhat: band.mean,
                yhat_lower: band.lower,
                yhat_upper: band.upper,
            })
            .collect();

        Ok(ForecastResult {
            city: city.to_string(),
            horizon_hours: steps,
            series,
            algorithm,
            from_cache,
        })
    }

    fn train_and_store(&self, city: &str, train_days: u32) -> Result<FittedModel> {
        let algorithm = self.settings.algorithm;
        let series = SeriesPreparer::load(self.repository.as_ref(), city, train_days)?;
        log::info!(
            "training city={} algorithm={} hours={}",
            city,
            algorithm,
            series.len()
        );

        let model = fit_with_budget(
            &self.trainer,
            algorithm,
            series,
            self.settings.fit_options(),
            self.settings.fit_timeout(),
        )?;

        let artifact = ModelArtifact::new(city, train_days, model.clone());
        if let Err(err) = self.cache.put(city, algorithm, &artifact) {
            log::error!(
                "failed to cache model city={} algorithm={}: {}",
                city,
                algorithm,
                err
            );
        }
        Ok(model)
    }
}
