#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use pm_forecast::config::ForecastSettings;
use pm_forecast::data::{MeasurementSeries, RawSample};
use pm_forecast::error::{ForecastError, Result};
use pm_forecast::models::{
    Algorithm, DefaultTrainer, FitOptions, FittedModel, ModelTrainer,
};
use pm_forecast::repository::InMemoryRepository;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use series_math::MathError;
use std::f64::consts::PI;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Timestamp of the newest synthetic reading
pub fn end_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 31, 23, 0, 0).unwrap()
}

/// Hourly PM2.5-like values: daily and weekly cycles plus seeded noise
pub fn synthetic_values(hours: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, 2.0).unwrap();
    (0..hours)
        .map(|i| {
            let t = i as f64;
            40.0 + 12.0 * (2.0 * PI * t / 24.0).sin()
                + 4.0 * (2.0 * PI * t / 168.0).sin()
                + noise.sample(&mut rng)
        })
        .collect()
}

/// `days` of hourly readings ending at [`end_time`]
pub fn synthetic_samples(days: u32, seed: u64) -> Vec<RawSample> {
    let hours = days as usize * 24;
    let start = end_time() - Duration::hours(hours as i64 - 1);
    synthetic_values(hours, seed)
        .into_iter()
        .enumerate()
        .map(|(i, v)| RawSample::new(start + Duration::hours(i as i64), v))
        .collect()
}

pub fn synthetic_series(city: &str, hours: usize, seed: u64) -> MeasurementSeries {
    let start = end_time() - Duration::hours(hours as i64 - 1);
    MeasurementSeries::hourly(city, start, synthetic_values(hours, seed)).unwrap()
}

/// Store with Colombo (30 days) and Galle (14 days); Kandy has no rows
pub fn sample_repository() -> InMemoryRepository {
    InMemoryRepository::new()
        .with_city("Colombo", synthetic_samples(30, 7))
        .with_city("Galle", synthetic_samples(14, 11))
}

pub fn test_settings(model_dir: &Path, algorithm: Algorithm) -> ForecastSettings {
    ForecastSettings {
        model_dir: model_dir.to_path_buf(),
        algorithm,
        ..ForecastSettings::default()
    }
}

/// Trainer that counts how often it is asked to fit
#[derive(Debug, Default)]
pub struct CountingTrainer {
    calls: AtomicUsize,
}

impl CountingTrainer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ModelTrainer for CountingTrainer {
    fn fit(
        &self,
        algorithm: Algorithm,
        series: &MeasurementSeries,
        options: &FitOptions,
    ) -> Result<FittedModel> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        DefaultTrainer.fit(algorithm, series, options)
    }
}

/// Trainer whose every fit fails
#[derive(Debug, Default)]
pub struct FailingTrainer;

impl ModelTrainer for FailingTrainer {
    fn fit(
        &self,
        algorithm: Algorithm,
        _series: &MeasurementSeries,
        _options: &FitOptions,
    ) -> Result<FittedModel> {
        Err(ForecastError::ModelFit {
            algorithm,
            source: MathError::CalculationError("forced failure".to_string()),
        })
    }
}
