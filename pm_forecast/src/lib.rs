//! # PM Forecast
//!
//! Per-city PM2.5 forecasting over hourly measurement history.
//!
//! ## Features
//!
//! - Hourly series preparation (resampling, gap interpolation, edge fill)
//! - Two model families: seasonal ARIMA and additive trend + seasonality
//! - 80% interval forecasts for any horizon in whole days
//! - Persistent per-city model cache with safe concurrent writes
//! - Rolling-origin backtesting with pooled MAE/RMSE
//! - Parallel multi-city forecasts with best/worst ranking
//!
//! ## Quick Start
//!
//! ```no_run
//! use pm_forecast::cache::ModelCache;
//! use pm_forecast::config::ForecastSettings;
//! use pm_forecast::forecaster::Forecaster;
//! use pm_forecast::repository::CsvRepository;
//! use std::sync::Arc;
//!
//! let settings = ForecastSettings::default();
//! let cache = Arc::new(ModelCache::new(&settings.model_dir)?);
//! let repository = Arc::new(CsvRepository::new("measurements.csv"));
//! let forecaster = Forecaster::new(repository, cache, settings);
//!
//! // Three days ahead from the last 30 days, reusing a cached model if any
//! let result = forecaster.forecast_city("Colombo", 3, 30, true)?;
//! assert_eq!(result.series.len(), 72);
//! # Ok::<(), pm_forecast::error::ForecastError>(())
//! ```

pub mod backtest;
pub mod cache;
pub mod config;
pub mod data;
pub mod error;
pub mod forecaster;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod repository;
pub mod utils;

pub use backtest::{BacktestResult, Backtester};
pub use cache::{CachePolicy, ModelArtifact, ModelCache};
pub use config::{ForecastSettings, RequestLimits};
pub use data::{MeasurementSeries, RawSample, SeriesPreparer};
pub use error::{ForecastError, Result};
pub use forecaster::{ForecastPoint, ForecastResult, Forecaster};
pub use models::{Algorithm, FitOptions, FittedModel, ModelTrainer, Verbosity};
pub use orchestrator::{CityOutcome, CitySummary, MultiCityForecast, MultiCityOrchestrator};
pub use repository::{CsvRepository, InMemoryRepository, SeriesRepository};
