//! Additive trend and seasonality model
//!
//! The series is modelled as a piecewise-linear trend plus a sum of Fourier
//! seasonalities. Trend changepoints are spread evenly over the first part of
//! the history and their rate adjustments are shrunk towards zero by a ridge
//! penalty, as are the seasonal coefficients. The whole fit is one penalised
//! least-squares solve.

use crate::data::MeasurementSeries;
use crate::error::Result;
use crate::models::{
    band, check_trainable, fit_error, Algorithm, FitOptions, ForecastModel, IntervalForecast,
    TrainedForecastModel, Verbosity, INTERVAL_WIDTH,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use series_math::distribution::interval_z;
use series_math::fourier::fourier_terms;
use series_math::linalg::ridge_least_squares;
use series_math::MathError;

/// Two days of hourly data
pub const MIN_OBSERVATIONS: usize = 48;

const ALGORITHM: Algorithm = Algorithm::AdditiveSeasonal;

/// Penalty on the intercept and base slope, just enough to keep the
/// normal equations positive definite
const BASE_PENALTY: f64 = 1e-6;

/// One Fourier seasonality
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalComponent {
    pub name: String,
    /// Cycle length in hours
    pub period_hours: f64,
    pub fourier_order: usize,
}

impl SeasonalComponent {
    pub fn new(name: impl Into<String>, period_hours: f64, fourier_order: usize) -> Self {
        Self {
            name: name.into(),
            period_hours,
            fourier_order,
        }
    }

    pub fn daily() -> Self {
        Self::new("daily", 24.0, 4)
    }

    pub fn weekly() -> Self {
        Self::new("weekly", 24.0 * 7.0, 3)
    }

    pub fn yearly() -> Self {
        Self::new("yearly", 24.0 * 365.25, 10)
    }

    fn width(&self) -> usize {
        2 * self.fourier_order
    }
}

/// Additive model specification
#[derive(Debug, Clone)]
pub struct AdditiveSeasonal {
    name: String,
    n_changepoints: usize,
    /// Share of the history in which changepoints may sit
    changepoint_range: f64,
    changepoint_prior_scale: f64,
    seasonality_prior_scale: f64,
    seasonalities: Vec<SeasonalComponent>,
}

impl Default for AdditiveSeasonal {
    /// Daily and weekly seasonality, yearly off, plus an extra 24 hour
    /// component of order 8
    fn default() -> Self {
        Self {
            name: "AdditiveSeasonal".to_string(),
            n_changepoints: 25,
            changepoint_range: 0.8,
            changepoint_prior_scale: 0.05,
            seasonality_prior_scale: 10.0,
            seasonalities: vec![
                SeasonalComponent::daily(),
                SeasonalComponent::weekly(),
                SeasonalComponent::new("hourly", 24.0, 8),
            ],
        }
    }
}

impl AdditiveSeasonal {
    /// Model with only the given seasonalities
    pub fn new(seasonalities: Vec<SeasonalComponent>) -> Self {
        Self {
            seasonalities,
            ..Default::default()
        }
    }

    pub fn with_changepoints(mut self, n_changepoints: usize) -> Self {
        self.n_changepoints = n_changepoints;
        self
    }

    pub fn with_changepoint_prior_scale(mut self, scale: f64) -> Self {
        self.changepoint_prior_scale = scale;
        self
    }

    pub fn with_seasonality_prior_scale(mut self, scale: f64) -> Self {
        self.seasonality_prior_scale = scale;
        self
    }

    pub fn add_seasonality(mut self, component: SeasonalComponent) -> Self {
        self.seasonalities.push(component);
        self
    }

    pub fn seasonalities(&self) -> &[SeasonalComponent] {
        &self.seasonalities
    }

    /// Changepoint positions on the scaled time axis
    fn changepoints(&self, scaled_t: &[f64]) -> Vec<f64> {
        let history = ((scaled_t.len() as f64) * self.changepoint_range).floor() as usize;
        if history < 2 {
            return Vec::new();
        }
        let count = self.n_changepoints.min(history - 1);
        (1..=count)
            .map(|i| {
                let idx = (i as f64 * (history - 1) as f64 / count as f64).round() as usize;
                scaled_t[idx.min(history - 1)]
            })
            .collect()
    }
}

fn hours_since_epoch(ts: DateTime<Utc>) -> f64 {
    ts.timestamp() as f64 / 3600.0
}

/// Trained additive model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedAdditiveSeasonal {
    name: String,
    seasonalities: Vec<SeasonalComponent>,
    /// Changepoints on the scaled time axis
    changepoints: Vec<f64>,
    /// `[intercept, slope, deltas.., seasonal..]` in scaled units
    coefficients: Vec<f64>,
    /// Hours since epoch of the first observation
    t_start: f64,
    /// Hours spanned by the training data
    t_span: f64,
    y_scale: f64,
    /// Residual standard deviation, scaled units
    sigma: f64,
    /// Mean absolute changepoint delta
    delta_scale: f64,
    last_timestamp: DateTime<Utc>,
    n_obs: usize,
}

fn design_row(
    scaled_t: f64,
    abs_hours: f64,
    changepoints: &[f64],
    seasonalities: &[SeasonalComponent],
) -> Vec<f64> {
    let mut row = Vec::with_capacity(2 + changepoints.len() + 16);
    row.push(1.0);
    row.push(scaled_t);
    row.extend(changepoints.iter().map(|&c| (scaled_t - c).max(0.0)));
    for component in seasonalities {
        row.extend(fourier_terms(
            abs_hours,
            component.period_hours,
            component.fourier_order,
        ));
    }
    row
}

impl ForecastModel for AdditiveSeasonal {
    type Trained = TrainedAdditiveSeasonal;

    fn train(&self, series: &MeasurementSeries, options: &FitOptions) -> Result<Self::Trained> {
        check_trainable(ALGORITHM, series)?;
        if self.changepoint_prior_scale <= 0.0 || self.seasonality_prior_scale <= 0.0 {
            return Err(fit_error(ALGORITHM)(MathError::InvalidInput(
                "Prior scales must be positive".to_string(),
            )));
        }

        let timestamps = series.timestamps();
        let (first, last) = match (series.first_timestamp(), series.last_timestamp()) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                return Err(fit_error(ALGORITHM)(MathError::InsufficientData(
                    "Empty series".to_string(),
                )))
            }
        };
        let t_start = hours_since_epoch(first);
        let t_span = (hours_since_epoch(last) - t_start).max(1.0);

        let y_scale = series
            .values()
            .iter()
            .fold(0.0_f64, |acc, v| acc.max(v.abs()));
        let y_scale = if y_scale > 0.0 { y_scale } else { 1.0 };
        let y: Vec<f64> = series.values().iter().map(|v| v / y_scale).collect();

        let abs_hours: Vec<f64> = timestamps.iter().map(|&ts| hours_since_epoch(ts)).collect();
        let scaled_t: Vec<f64> = abs_hours.iter().map(|h| (h - t_start) / t_span).collect();
        let changepoints = self.changepoints(&scaled_t);

        let rows: Vec<Vec<f64>> = scaled_t
            .iter()
            .zip(abs_hours.iter())
            .map(|(&t, &h)| design_row(t, h, &changepoints, &self.seasonalities))
            .collect();

        let seasonal_width: usize = self.seasonalities.iter().map(|c| c.width()).sum();
        let mut penalties = vec![BASE_PENALTY, BASE_PENALTY];
        penalties.extend(
            std::iter::repeat(1.0 / self.changepoint_prior_scale.powi(2)).take(changepoints.len()),
        );
        penalties.extend(
            std::iter::repeat(1.0 / self.seasonality_prior_scale.powi(2)).take(seasonal_width),
        );

        let coefficients =
            ridge_least_squares(&rows, &y, &penalties).map_err(fit_error(ALGORITHM))?;

        let sse: f64 = rows
            .iter()
            .zip(y.iter())
            .map(|(row, target)| {
                let fitted: f64 = row.iter().zip(coefficients.iter()).map(|(x, b)| x * b).sum();
                (target - fitted).powi(2)
            })
            .sum();
        let sigma = (sse / y.len() as f64).sqrt();
        if !sigma.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
            return Err(fit_error(ALGORITHM)(MathError::CalculationError(
                "Least-squares solution is not finite".to_string(),
            )));
        }

        let deltas = &coefficients[2..2 + changepoints.len()];
        let delta_scale = if deltas.is_empty() {
            0.0
        } else {
            deltas.iter().map(|d| d.abs()).sum::<f64>() / deltas.len() as f64
        };

        if options.verbosity != Verbosity::Quiet {
            log::debug!(
                "fitted city={} model={} n={} changepoints={} seasonal_terms={} sigma={:.4}",
                series.city(),
                self.name,
                series.len(),
                changepoints.len(),
                seasonal_width,
                sigma * y_scale
            );
        }
        if options.verbosity == Verbosity::Verbose {
            log::trace!(
                "trend intercept={:.4} slope={:.4} delta_scale={:.4e}",
                coefficients[0],
                coefficients[1],
                delta_scale
            );
        }

        Ok(TrainedAdditiveSeasonal {
            name: self.name.clone(),
            seasonalities: self.seasonalities.clone(),
            changepoints,
            coefficients,
            t_start,
            t_span,
            y_scale,
            sigma,
            delta_scale,
            last_timestamp: last,
            n_obs: series.len(),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl TrainedAdditiveSeasonal {
    pub fn changepoints(&self) -> &[f64] {
        &self.changepoints
    }

    pub fn seasonalities(&self) -> &[SeasonalComponent] {
        &self.seasonalities
    }

    pub fn n_obs(&self) -> usize {
        self.n_obs
    }

    /// Residual standard deviation in data units
    pub fn residual_std(&self) -> f64 {
        self.sigma * self.y_scale
    }

    /// Variance of future trend changes at scaled time `t`.
    ///
    /// Future changepoints arrive at the historical rate with Laplace
    /// magnitudes of scale `delta_scale`; each adds `delta * (t - s)`.
    fn trend_variance(&self, t: f64) -> f64 {
        if t <= 1.0 || self.changepoints.is_empty() {
            return 0.0;
        }
        let rate = self.changepoints.len() as f64;
        let lambda = self.delta_scale + 1e-8;
        rate * 2.0 * lambda * lambda * (t - 1.0).powi(3) / 3.0
    }
}

impl TrainedForecastModel for TrainedAdditiveSeasonal {
    fn forecast(&self, steps: usize) -> Result<Vec<IntervalForecast>> {
        let z = interval_z(INTERVAL_WIDTH).map_err(fit_error(ALGORITHM))?;
        let t_last = self.t_start + self.t_span;

        let mut out = Vec::with_capacity(steps);
        for h in 1..=steps {
            let abs_hours = t_last + h as f64;
            let scaled_t = (abs_hours - self.t_start) / self.t_span;
            let row = design_row(scaled_t, abs_hours, &self.changepoints, &self.seasonalities);
            let mean: f64 = row
                .iter()
                .zip(self.coefficients.iter())
                .map(|(x, b)| x * b)
                .sum();
            let se = (self.sigma.powi(2) + self.trend_variance(scaled_t)).sqrt();
            if !mean.is_finite() || !se.is_finite() {
                return Err(fit_error(ALGORITHM)(MathError::CalculationError(format!(
                    "Forecast is not finite at step {}",
                    h
                ))));
            }
            out.push(band(mean * self.y_scale, se * self.y_scale, z));
        }
        Ok(out)
    }

    fn last_timestamp(&self) -> DateTime<Utc> {
        self.last_timestamp
    }

    fn name(&self) -> &str {
        &self.name
    }
}
