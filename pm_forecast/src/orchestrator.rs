//! Forecasts for many cities at once
//!
//! Cities run in parallel and independently: one city failing leaves the
//! others untouched and shows up as an error entry in the result.

use crate::error::{ForecastError, Result};
use crate::forecaster::{ForecastPoint, Forecaster};
use rayon::prelude::*;
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Per-city outcome of a multi-city run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CityOutcome {
    Series(Vec<ForecastPoint>),
    Failed { error: String },
}

impl CityOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, CityOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CitySummary {
    /// Mean point forecast, `None` when the city failed
    pub mean_yhat: Option<f64>,
    pub n_points: usize,
}

/// Result of [`MultiCityOrchestrator::forecast_cities`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiCityForecast {
    pub by_city: BTreeMap<String, CityOutcome>,
    pub summary: BTreeMap<String, CitySummary>,
    /// City with the lowest mean forecast
    pub best: Option<String>,
    /// City with the highest mean forecast
    pub worst: Option<String>,
}

/// Lowest and highest `mean_yhat` among cities that have one.
///
/// Iteration is in city order and only a strictly better value replaces the
/// current pick, so ties go to the alphabetically first city.
pub fn rank_cities(summary: &BTreeMap<String, CitySummary>) -> (Option<String>, Option<String>) {
    let mut best: Option<(&String, f64)> = None;
    let mut worst: Option<(&String, f64)> = None;
    for (city, stats) in summary {
        let mean = match stats.mean_yhat {
            Some(mean) if mean.is_finite() => mean,
            _ => continue,
        };
        if best.map_or(true, |(_, b)| mean < b) {
            best = Some((city, mean));
        }
        if worst.map_or(true, |(_, w)| mean > w) {
            worst = Some((city, mean));
        }
    }
    (
        best.map(|(city, _)| city.clone()),
        worst.map(|(city, _)| city.clone()),
    )
}

/// Runs one forecaster over several cities on a dedicated thread pool
pub struct MultiCityOrchestrator {
    forecaster: Arc<Forecaster>,
    pool: ThreadPool,
}

impl MultiCityOrchestrator {
    /// Pool sized from the forecaster's `workers` setting
    pub fn new(forecaster: Arc<Forecaster>) -> Result<Self> {
        let threads = forecaster.settings().worker_threads();
        Self::with_threads(forecaster, threads)
    }

    pub fn with_threads(forecaster: Arc<Forecaster>, threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("pmcast-city-{}", i))
            .build()
            .map_err(|e| ForecastError::Config(format!("Failed to start worker pool: {}", e)))?;
        Ok(Self { forecaster, pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Forecast every city; duplicates are forecast once
    pub fn forecast_cities(
        &self,
        cities: &[String],
        horizon_days: u32,
        train_days: u32,
        use_cache: bool,
    ) -> MultiCityForecast {
        let mut unique: Vec<&String> = cities.iter().collect();
        unique.sort();
        unique.dedup();

        let forecaster = &self.forecaster;
        let outcomes: Vec<(String, CityOutcome, CitySummary)> = self.pool.install(|| {
            unique
                .into_par_iter()
                .map(|city| {
                    match forecaster.forecast_city(city, horizon_days, train_days, use_cache) {
                        Ok(result) => {
                            let summary = CitySummary {
                                mean_yhat: result.mean_yhat(),
                                n_points: result.series.len(),
                            };
                            (city.clone(), CityOutcome::Series(result.series), summary)
                        }
                        Err(err) => {
                            log::warn!("forecast failed city={}: {}", city, err);
                            (
                                city.clone(),
                                CityOutcome::Failed {
                                    error: err.to_string(),
                                },
                                CitySummary {
                                    mean_yhat: None,
                                    n_points: 0,
                                },
                            )
                        }
                    }
                })
                .collect()
        });

        let mut by_city = BTreeMap::new();
        let mut summary = BTreeMap::new();
        for (city, outcome, stats) in outcomes {
            by_city.insert(city.clone(), outcome);
            summary.insert(city, stats);
        }
        let (best, worst) = rank_cities(&summary);

        MultiCityForecast {
            by_city,
            summary,
            best,
            worst,
        }
    }
}
