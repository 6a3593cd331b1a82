//! Seasonal ARIMA model for hourly series
//!
//! The model is ARIMA(1,1,1)(1,0,1)[24]: the series is differenced once, and
//! the differences follow
//!
//! ```text
//! (1 - phi B)(1 - PHI B^24) w_t = (1 + theta B)(1 + THETA B^24) e_t
//! ```
//!
//! There is no constant, so forecasts carry no drift. Parameters are estimated by conditional sum of squares. Stationarity and
//! invertibility are not enforced; coefficients are only kept inside a wide
//! box so the optimiser converges on short or awkward series.

use crate::data::MeasurementSeries;
use crate::error::Result;
use crate::models::{
    band, check_trainable, fit_error, Algorithm, FitOptions, ForecastModel, IntervalForecast,
    TrainedForecastModel, Verbosity, INTERVAL_WIDTH,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use series_math::distribution::interval_z;
use series_math::optimization::{nelder_mead, NelderMeadConfig};
use series_math::MathError;

/// Daily cycle of hourly data
pub const DAILY_PERIOD: usize = 24;

/// Two seasonal cycles plus the differencing lag
pub const MIN_OBSERVATIONS: usize = 2 * DAILY_PERIOD + 2;

const ALGORITHM: Algorithm = Algorithm::SeasonalArima;

/// Extra optimiser runs after a stalled first run
const RESTARTS: usize = 2;

/// Seasonal ARIMA model specification
#[derive(Debug, Clone)]
pub struct SeasonalArima {
    /// Name of the model
    name: String,
    /// Seasonal period in hours
    period: usize,
    /// Absolute bound on every AR/MA coefficient
    coefficient_bound: f64,
    /// Optimiser iteration cap
    max_iter: usize,
}

/// Trained seasonal ARIMA model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedSeasonalArima {
    name: String,
    period: usize,
    ar: f64,
    ma: f64,
    seasonal_ar: f64,
    seasonal_ma: f64,
    /// Residual variance
    sigma2: f64,
    /// Last observed level, the anchor for integrating forecasts
    last_value: f64,
    /// Last `period + 1` differenced values
    diff_tail: Vec<f64>,
    /// Last `period + 1` residuals
    residual_tail: Vec<f64>,
    last_timestamp: DateTime<Utc>,
    n_obs: usize,
}

impl SeasonalArima {
    /// Create a model with the given seasonal period
    pub fn new(period: usize) -> Self {
        Self {
            name: format!("SARIMA(1,1,1)(1,0,1)[{}]", period),
            period,
            coefficient_bound: 1.5,
            max_iter: 5000,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Override the coefficient box (default 1.5)
    pub fn with_coefficient_bound(mut self, bound: f64) -> Self {
        self.coefficient_bound = bound;
        self
    }

    /// Override the optimiser iteration cap (default 5000)
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }
}

impl Default for SeasonalArima {
    fn default() -> Self {
        Self::new(DAILY_PERIOD)
    }
}

/// Parameter vector layout: [phi, theta, PHI, THETA]
#[derive(Debug, Clone, Copy)]
struct Params {
    ar: f64,
    ma: f64,
    sar: f64,
    sma: f64,
}

impl Params {
    fn from_slice(p: &[f64]) -> Self {
        Self {
            ar: p[0],
            ma: p[1],
            sar: p[2],
            sma: p[3],
        }
    }
}

/// One-step prediction of `w[t]` from the values and residuals before `t`
fn predict_at(w: &[f64], e: &[f64], t: usize, s: usize, p: &Params) -> f64 {
    let mut pred = 0.0;
    if t >= 1 {
        pred += p.ar * w[t - 1] + p.ma * e[t - 1];
    }
    if t >= s {
        pred += p.sar * w[t - s] + p.sma * e[t - s];
    }
    if t > s {
        pred += -p.ar * p.sar * w[t - s - 1] + p.ma * p.sma * e[t - s - 1];
    }
    pred
}

/// Conditional residuals; the first `s + 1` are taken as zero
fn residuals(w: &[f64], s: usize, p: &Params) -> Vec<f64> {
    let mut e = vec![0.0; w.len()];
    for t in (s + 1)..w.len() {
        e[t] = w[t] - predict_at(w, &e, t, s, p);
    }
    e
}

fn conditional_sum_of_squares(w: &[f64], s: usize, p: &Params) -> f64 {
    residuals(w, s, p)[s + 1..].iter().map(|r| r * r).sum()
}

fn poly_mul(a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

impl ForecastModel for SeasonalArima {
    type Trained = TrainedSeasonalArima;

    fn train(&self, series: &MeasurementSeries, options: &FitOptions) -> Result<Self::Trained> {
        check_trainable(ALGORITHM, series)?;
        let last_timestamp = series.last_timestamp().ok_or_else(|| {
            fit_error(ALGORITHM)(MathError::InsufficientData("Empty series".to_string()))
        })?;
        let s = self.period;
        let y = series.values();
        let w: Vec<f64> = y.windows(2).map(|pair| pair[1] - pair[0]).collect();
        if w.len() <= s + 1 {
            return Err(fit_error(ALGORITHM)(MathError::InsufficientData(format!(
                "Differenced series of {} points is too short for period {}",
                w.len(),
                s
            ))));
        }

        let b = self.coefficient_bound;
        let bounds = [(-b, b); 4];
        let config = NelderMeadConfig {
            max_iter: self.max_iter,
            f_tolerance: 1e-8,
            x_tolerance: 1e-5,
            trace: options.verbosity == Verbosity::Verbose,
            ..Default::default()
        };

        let objective = |p: &[f64]| conditional_sum_of_squares(&w, s, &Params::from_slice(p));
        let mut result = nelder_mead(
            objective,
            &[0.1, 0.1, 0.1, 0.1],
            Some(&bounds),
            &config,
        )
        .map_err(fit_error(ALGORITHM))?;
        let mut iterations = result.iterations;

        // A collapsed simplex can stall short of the tolerances; restart it
        // around the best point found so far
        for _ in 0..RESTARTS {
            if result.converged {
                break;
            }
            result = nelder_mead(objective, &result.point, Some(&bounds), &config)
                .map_err(fit_error(ALGORITHM))?;
            iterations += result.iterations;
        }

        if !result.converged {
            return Err(fit_error(ALGORITHM)(MathError::NotConverged {
                iterations,
                objective: result.value,
            }));
        }

        let params = Params::from_slice(&result.point);
        let e = residuals(&w, s, &params);
        let effective = (w.len() - (s + 1)) as f64;
        let sigma2 = result.value / effective;
        if !sigma2.is_finite() {
            return Err(fit_error(ALGORITHM)(MathError::CalculationError(
                "Residual variance is not finite".to_string(),
            )));
        }

        if options.verbosity != Verbosity::Quiet {
            log::debug!(
                "fitted city={} model={} n={} iterations={} phi={:.4} theta={:.4} sphi={:.4} stheta={:.4} sigma2={:.4}",
                series.city(),
                self.name,
                series.len(),
                iterations,
                params.ar,
                params.ma,
                params.sar,
                params.sma,
                sigma2
            );
        }

        let tail_start = w.len() - (s + 1);
        Ok(TrainedSeasonalArima {
            name: self.name.clone(),
            period: s,
            ar: params.ar,
            ma: params.ma,
            seasonal_ar: params.sar,
            seasonal_ma: params.sma,
            sigma2,
            last_value: y[y.len() - 1],
            diff_tail: w[tail_start..].to_vec(),
            residual_tail: e[tail_start..].to_vec(),
            last_timestamp,
            n_obs: series.len(),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl TrainedSeasonalArima {
    pub fn coefficients(&self) -> (f64, f64, f64, f64) {
        (self.ar, self.ma, self.seasonal_ar, self.seasonal_ma)
    }

    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }

    pub fn n_obs(&self) -> usize {
        self.n_obs
    }

    fn params(&self) -> Params {
        Params {
            ar: self.ar,
            ma: self.ma,
            sar: self.seasonal_ar,
            sma: self.seasonal_ma,
        }
    }

    /// MA(infinity) weights of the integrated model, `psi_0 = 1`
    fn psi_weights(&self, horizon: usize) -> Vec<f64> {
        let s = self.period;
        let mut seasonal_ar = vec![0.0; s + 1];
        seasonal_ar[0] = 1.0;
        seasonal_ar[s] = -self.seasonal_ar;
        let mut seasonal_ma = vec![0.0; s + 1];
        seasonal_ma[0] = 1.0;
        seasonal_ma[s] = self.seasonal_ma;

        // phi(B) including the unit root from differencing
        let ar_poly = poly_mul(&poly_mul(&[1.0, -1.0], &[1.0, -self.ar]), &seasonal_ar);
        let ma_poly = poly_mul(&[1.0, self.ma], &seasonal_ma);

        let mut psi = vec![0.0; horizon];
        if horizon == 0 {
            return psi;
        }
        psi[0] = 1.0;
        for j in 1..horizon {
            let mut value = ma_poly.get(j).copied().unwrap_or(0.0);
            for i in 1..ar_poly.len().min(j + 1) {
                value -= ar_poly[i] * psi[j - i];
            }
            psi[j] = value;
        }
        psi
    }
}

impl TrainedForecastModel for TrainedSeasonalArima {
    fn forecast(&self, steps: usize) -> Result<Vec<IntervalForecast>> {
        let s = self.period;
        let params = self.params();
        let z = interval_z(INTERVAL_WIDTH).map_err(fit_error(ALGORITHM))?;

        let mut w = self.diff_tail.clone();
        let mut e = self.residual_tail.clone();
        let mut level = self.last_value;
        let psi = self.psi_weights(steps);

        let mut out = Vec::with_capacity(steps);
        let mut cumulative_var = 0.0;
        for h in 0..steps {
            let t = w.len();
            let diff = predict_at(&w, &e, t, s, &params);
            w.push(diff);
            // Future shocks have zero expectation
            e.push(0.0);
            level += diff;

            cumulative_var += psi[h] * psi[h];
            let se = (self.sigma2 * cumulative_var).sqrt();
            if !level.is_finite() || !se.is_finite() {
                return Err(fit_error(ALGORITHM)(MathError::CalculationError(format!(
                    "Forecast diverged at step {}",
                    h + 1
                ))));
            }
            out.push(band(level, se, z));
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
