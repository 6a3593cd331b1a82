//! Forecasting models for hourly pollutant series
//!
//! Two independent model families share one interface: [`ForecastModel`]
//! trains, [`TrainedForecastModel`] forecasts. [`FittedModel`] is the
//! serializable union of both trained types and [`ModelTrainer`] is the seam
//! the forecaster and backtester fit through, selected by [`Algorithm`].

use crate::data::MeasurementSeries;
use crate::error::{ForecastError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use series_math::MathError;
use std::fmt::{self, Debug};
use std::str::FromStr;

pub mod additive;
pub mod seasonal_arima;

pub use additive::{AdditiveSeasonal, SeasonalComponent, TrainedAdditiveSeasonal};
pub use seasonal_arima::{SeasonalArima, TrainedSeasonalArima};

/// Central interval width of every forecast band (10% in each tail)
pub const INTERVAL_WIDTH: f64 = 0.80;

/// One week of hourly observations
pub const ONE_WEEK_HOURS: usize = 24 * 7;

/// Model family tag, also used in artifact file names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Seasonal ARIMA (1,1,1)(1,0,1)[24]
    SeasonalArima,
    /// Piecewise-linear trend plus additive Fourier seasonality
    AdditiveSeasonal,
}

impl Algorithm {
    /// Short tag used in cache keys
    pub fn tag(&self) -> &'static str {
        match self {
            Algorithm::SeasonalArima => "sarima",
            Algorithm::AdditiveSeasonal => "additive",
        }
    }

    /// History a backtest must train on before its first checkpoint
    pub fn min_training_hours(&self) -> usize {
        ONE_WEEK_HOURS
    }

    /// Shortest series the model can be fitted on at all
    pub fn min_observations(&self) -> usize {
        match self {
            Algorithm::SeasonalArima => seasonal_arima::MIN_OBSERVATIONS,
            Algorithm::AdditiveSeasonal => additive::MIN_OBSERVATIONS,
        }
    }

    pub fn all() -> [Algorithm; 2] {
        [Algorithm::SeasonalArima, Algorithm::AdditiveSeasonal]
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Algorithm {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sarima" | "sarimax" | "seasonal_arima" => Ok(Algorithm::SeasonalArima),
            "additive" | "additive_seasonal" | "prophet" => Ok(Algorithm::AdditiveSeasonal),
            other => Err(ForecastError::InvalidParameter(format!(
                "Unknown algorithm: {}",
                other
            ))),
        }
    }
}

/// How chatty model fitting is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    /// Nothing beyond warnings
    Quiet,
    /// One summary line per fit at debug level
    #[default]
    Normal,
    /// Optimiser progress at trace level
    Verbose,
}

impl FromStr for Verbosity {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "quiet" => Ok(Verbosity::Quiet),
            "normal" => Ok(Verbosity::Normal),
            "verbose" => Ok(Verbosity::Verbose),
            other => Err(ForecastError::InvalidParameter(format!(
                "Unknown verbosity: {}",
                other
            ))),
        }
    }
}

/// Options threaded into every fit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FitOptions {
    pub verbosity: Verbosity,
}

impl FitOptions {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }
}

/// Point forecast with its interval bounds for one step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntervalForecast {
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Trained forecast model
pub trait TrainedForecastModel: Debug + Send + Sync {
    /// Forecast `steps` hours after the last training timestamp
    fn forecast(&self, steps: usize) -> Result<Vec<IntervalForecast>>;

    /// Timestamp of the last training observation
    fn last_timestamp(&self) -> DateTime<Utc>;

    /// Name of the model
    fn name(&self) -> &str;
}

/// Forecast model that can be trained on a prepared series
pub trait ForecastModel: Debug + Clone {
    /// The type of trained model produced
    type Trained: TrainedForecastModel;

    /// Train the model on a gapless hourly series
    fn train(&self, series: &MeasurementSeries, options: &FitOptions) -> Result<Self::Trained>;

    /// Get the name of the model
    fn name(&self) -> &str;
}

/// Any trained model, in the form persisted by the model cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FittedModel {
    SeasonalArima(TrainedSeasonalArima),
    AdditiveSeasonal(TrainedAdditiveSeasonal),
}

impl FittedModel {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            FittedModel::SeasonalArima(_) => Algorithm::SeasonalArima,
            FittedModel::AdditiveSeasonal(_) => Algorithm::AdditiveSeasonal,
        }
    }

    fn inner(&self) -> &dyn TrainedForecastModel {
        match self {
            FittedModel::SeasonalArima(m) => m,
            FittedModel::AdditiveSeasonal(m) => m,
        }
    }
}

impl TrainedForecastModel for FittedModel {
    fn forecast(&self, steps: usize) -> Result<Vec<IntervalForecast>> {
        self.inner().forecast(steps)
    }

    fn last_timestamp(&self) -> DateTime<Utc> {
        self.inner().last_timestamp()
    }

    fn name(&self) -> &str {
        self.inner().name()
    }
}

/// Fits a model of the requested family
pub trait ModelTrainer: Send + Sync {
    fn fit(
        &self,
        algorithm: Algorithm,
        series: &MeasurementSeries,
        options: &FitOptions,
    ) -> Result<FittedModel>;
}

/// Trainer using the stock configuration of each family
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTrainer;

impl ModelTrainer for DefaultTrainer {
    fn fit(
        &self,
        algorithm: Algorithm,
        series: &MeasurementSeries,
        options: &FitOptions,
    ) -> Result<FittedModel> {
        match algorithm {
            Algorithm::SeasonalArima => SeasonalArima::default()
                .train(series, options)
                .map(FittedModel::SeasonalArima),
            Algorithm::AdditiveSeasonal => AdditiveSeasonal::default()
                .train(series, options)
                .map(FittedModel::AdditiveSeasonal),
        }
    }
}

/// Wrap a numerical failure as a fit error for `algorithm`
pub(crate) fn fit_error(algorithm: Algorithm) -> impl Fn(MathError) -> ForecastError {
    move |source| ForecastError::ModelFit { algorithm, source }
}

/// Check a series is long enough and internally consistent for fitting
pub(crate) fn check_trainable(algorithm: Algorithm, series: &MeasurementSeries) -> Result<()> {
    let needed = algorithm.min_observations();
    if series.len() < needed {
        return Err(fit_error(algorithm)(MathError::InsufficientData(format!(
            "{} needs at least {} hourly observations, got {}",
            algorithm,
            needed,
            series.len()
        ))));
    }
    Ok(())
}

/// Symmetric normal band around `mean` with standard error `se`
pub(crate) fn band(mean: f64, se: f64, z: f64) -> IntervalForecast {
    let half = z * se.max(0.0);
    IntervalForecast {
        mean,
        lower: mean - half,
        upper: mean + half,
    }
}
