//! Runtime settings for forecasting runs
//!
//! Settings come from a JSON file, then `PMCAST_*` environment variables,
//! then command-line flags, each layer overriding the previous one.

use crate::cache::CachePolicy;
use crate::error::{ForecastError, Result};
use crate::models::{Algorithm, FitOptions, Verbosity};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Prefix of every environment override
pub const ENV_PREFIX: &str = "PMCAST_";

/// Default directory for model artifacts
pub const DEFAULT_MODEL_DIR: &str = "models";

/// Default per-fit budget
pub const DEFAULT_FIT_TIMEOUT_SECS: u64 = 120;

/// Default budget for a whole backtest
pub const DEFAULT_BACKTEST_TIMEOUT_SECS: u64 = 30 * 60;

/// Bounds on request parameters accepted from callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestLimits {
    pub min_horizon_days: u32,
    pub max_horizon_days: u32,
    pub min_train_days: u32,
    pub max_train_days: u32,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            min_horizon_days: 1,
            max_horizon_days: 30,
            min_train_days: 7,
            max_train_days: 120,
        }
    }
}

impl RequestLimits {
    pub fn validate_horizon(&self, horizon_days: u32) -> Result<()> {
        check_range(
            "horizon_days",
            horizon_days,
            self.min_horizon_days,
            self.max_horizon_days,
        )
    }

    pub fn validate_train(&self, train_days: u32) -> Result<()> {
        check_range(
            "train_days",
            train_days,
            self.min_train_days,
            self.max_train_days,
        )
    }
}

fn check_range(name: &str, value: u32, min: u32, max: u32) -> Result<()> {
    if value < min || value > max {
        return Err(ForecastError::InvalidParameter(format!(
            "{} must be between {} and {}, got {}",
            name, min, max, value
        )));
    }
    Ok(())
}

/// Settings shared by the forecaster, backtester and orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastSettings {
    /// Directory holding model artifacts
    pub model_dir: PathBuf,
    pub algorithm: Algorithm,
    /// Wall-clock budget of one model fit; `None` disables it
    pub fit_timeout_secs: Option<u64>,
    /// Wall-clock budget of one backtest; `None` disables it
    pub backtest_timeout_secs: Option<u64>,
    /// Threads for multi-city runs; 0 uses the available parallelism
    pub workers: usize,
    pub verbosity: Verbosity,
    pub cache_policy: CachePolicy,
    pub limits: RequestLimits,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from(DEFAULT_MODEL_DIR),
            algorithm: Algorithm::SeasonalArima,
            fit_timeout_secs: Some(DEFAULT_FIT_TIMEOUT_SECS),
            backtest_timeout_secs: Some(DEFAULT_BACKTEST_TIMEOUT_SECS),
            workers: 0,
            verbosity: Verbosity::default(),
            cache_policy: CachePolicy::default(),
            limits: RequestLimits::default(),
        }
    }
}

impl ForecastSettings {
    /// Load settings from a JSON file; missing keys keep their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ForecastError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Defaults with the process environment applied
    pub fn from_env() -> Result<Self> {
        let mut settings = Self::default();
        settings.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Apply `PMCAST_*` overrides read through `lookup`.
    ///
    /// Timeouts accept `0` or `off` to disable the budget.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, name))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(dir) = get("MODEL_DIR") {
            self.model_dir = PathBuf::from(dir);
        }
        if let Some(algorithm) = get("ALGORITHM") {
            self.algorithm = Algorithm::from_str(&algorithm)?;
        }
        if let Some(timeout) = get("FIT_TIMEOUT_SECS") {
            self.fit_timeout_secs = parse_timeout("FIT_TIMEOUT_SECS", &timeout)?;
        }
        if let Some(timeout) = get("BACKTEST_TIMEOUT_SECS") {
            self.backtest_timeout_secs = parse_timeout("BACKTEST_TIMEOUT_SECS", &timeout)?;
        }
        if let Some(workers) = get("WORKERS") {
            self.workers = parse_number("WORKERS", &workers)?;
        }
        if let Some(verbosity) = get("VERBOSITY") {
            self.verbosity = Verbosity::from_str(&verbosity)?;
        }
        if let Some(flag) = get("CACHE_MATCH_TRAIN_DAYS") {
            self.cache_policy.match_train_days = parse_flag("CACHE_MATCH_TRAIN_DAYS", &flag)?;
        }
        if let Some(hours) = get("CACHE_MAX_AGE_HOURS") {
            self.cache_policy.max_age_hours = parse_timeout("CACHE_MAX_AGE_HOURS", &hours)?;
        }
        Ok(())
    }

    pub fn fit_timeout(&self) -> Option<Duration> {
        self.fit_timeout_secs.map(Duration::from_secs)
    }

    pub fn backtest_timeout(&self) -> Option<Duration> {
        self.backtest_timeout_secs.map(Duration::from_secs)
    }

    pub fn fit_options(&self) -> FitOptions {
        FitOptions::new(self.verbosity)
    }

    /// Thread count for multi-city runs
    pub fn worker_threads(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

fn parse_number<T: FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.parse().map_err(|_| {
        ForecastError::Config(format!("{}{} is not a number: {}", ENV_PREFIX, name, raw))
    })
}

fn parse_timeout(name: &str, raw: &str) -> Result<Option<u64>> {
    if raw.eq_ignore_ascii_case("off") {
        return Ok(None);
    }
    let secs: u64 = parse_number(name, raw)?;
    Ok(if secs == 0 { None } else { Some(secs) })
}

fn parse_flag(name: &str, raw: &str) -> Result<bool> {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ForecastError::Config(format!(
            "{}{} is not a boolean: {}",
            ENV_PREFIX, name, raw
        ))),
    }
}
