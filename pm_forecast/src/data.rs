//! Hourly measurement series and their preparation for model fitting

use crate::error::{ForecastError, Result};
use crate::repository::SeriesRepository;
use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};
use series_math::interpolation::fill_gaps;
use std::collections::BTreeMap;

/// One timestamped reading as returned by the measurement store.
///
/// A `None` or non-finite value is a missing reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub ts: DateTime<Utc>,
    pub pm25: Option<f64>,
}

impl RawSample {
    pub fn new(ts: DateTime<Utc>, pm25: f64) -> Self {
        Self {
            ts,
            pm25: Some(pm25),
        }
    }

    pub fn missing(ts: DateTime<Utc>) -> Self {
        Self { ts, pm25: None }
    }
}

/// Ordered pollutant readings for one city.
///
/// Timestamps are strictly increasing. Series produced by
/// [`SeriesPreparer::prepare`] additionally have an exact one hour cadence
/// with no missing slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementSeries {
    city: String,
    timestamps: Vec<DateTime<Utc>>,
    values: Vec<f64>,
}

impl MeasurementSeries {
    /// Create a series, validating lengths and timestamp ordering
    pub fn new(
        city: impl Into<String>,
        timestamps: Vec<DateTime<Utc>>,
        values: Vec<f64>,
    ) -> Result<Self> {
        if timestamps.len() != values.len() {
            return Err(ForecastError::InvalidParameter(format!(
                "Timestamps length ({}) doesn't match values length ({})",
                timestamps.len(),
                values.len()
            )));
        }
        if timestamps.windows(2).any(|w| w[1] <= w[0]) {
            return Err(ForecastError::InvalidParameter(
                "Timestamps must be strictly increasing".to_string(),
            ));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::InvalidParameter(
                "Series values must be finite".to_string(),
            ));
        }

        Ok(Self {
            city: city.into(),
            timestamps,
            values,
        })
    }

    /// Create an hourly series starting at `start`
    pub fn hourly(city: impl Into<String>, start: DateTime<Utc>, values: Vec<f64>) -> Result<Self> {
        let timestamps = (0..values.len())
            .map(|i| start + Duration::hours(i as i64))
            .collect();
        Self::new(city, timestamps, values)
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps.last().copied()
    }

    /// True when consecutive timestamps are exactly one hour apart
    pub fn is_hourly(&self) -> bool {
        self.timestamps
            .windows(2)
            .all(|w| w[1] - w[0] == Duration::hours(1))
    }

    /// The first `n` observations (all of them if `n` exceeds the length)
    pub fn prefix(&self, n: usize) -> Self {
        let n = n.min(self.len());
        Self {
            city: self.city.clone(),
            timestamps: self.timestamps[..n].to_vec(),
            values: self.values[..n].to_vec(),
        }
    }

    /// Observations in `start..end`
    pub fn slice(&self, start: usize, end: usize) -> Result<Self> {
        if start > end || end > self.len() {
            return Err(ForecastError::InvalidParameter(format!(
                "Slice {}..{} is out of range for a series of {} points",
                start,
                end,
                self.len()
            )));
        }
        Ok(Self {
            city: self.city.clone(),
            timestamps: self.timestamps[start..end].to_vec(),
            values: self.values[start..end].to_vec(),
        })
    }
}

/// Turns raw store readings into a gapless hourly series
#[derive(Debug)]
pub struct SeriesPreparer;

impl SeriesPreparer {
    /// Resample `raw` onto an hourly grid and fill the holes.
    ///
    /// Readings are floored to the hour and averaged per hour. The grid spans
    /// the first to the last observed hour. Interior holes are linearly
    /// interpolated, holes at either edge copy the nearest value outward.
    pub fn prepare(city: &str, raw: &[RawSample], requested_days: u32) -> Result<MeasurementSeries> {
        let no_data = || ForecastError::NoData {
            city: city.to_string(),
            days: requested_days,
        };

        if raw.is_empty() {
            return Err(no_data());
        }

        // hour bucket -> (sum, count)
        let mut buckets: BTreeMap<DateTime<Utc>, (f64, usize)> = BTreeMap::new();
        for sample in raw {
            let hour = sample
                .ts
                .duration_trunc(Duration::hours(1))
                .map_err(|e| ForecastError::InvalidParameter(format!("Bad timestamp: {}", e)))?;
            let entry = buckets.entry(hour).or_insert((0.0, 0));
            if let Some(v) = sample.pm25.filter(|v| v.is_finite()) {
                entry.0 += v;
                entry.1 += 1;
            }
        }

        if buckets.values().all(|(_, count)| *count == 0) {
            return Err(no_data());
        }

        let (first, last) = match (buckets.keys().next(), buckets.keys().next_back()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Err(no_data()),
        };
        let slots = (last - first).num_hours() as usize + 1;

        let grid: Vec<Option<f64>> = (0..slots)
            .map(|i| {
                let hour = first + Duration::hours(i as i64);
                buckets
                    .get(&hour)
                    .filter(|(_, count)| *count > 0)
                    .map(|(sum, count)| sum / *count as f64)
            })
            .collect();

        let filled = fill_gaps(&grid).map_err(|_| no_data())?;
        if filled.interpolated + filled.extended > 0 {
            log::debug!(
                "prepared city={} hours={} interpolated={} extended={}",
                city,
                slots,
                filled.interpolated,
                filled.extended
            );
        }

        MeasurementSeries::hourly(city, first, filled.values)
    }

    /// Query `days` of history for `city` and prepare it
    pub fn load(
        repository: &dyn SeriesRepository,
        city: &str,
        days: u32,
    ) -> Result<MeasurementSeries> {
        let raw = repository.query_series(city, days)?;
        Self::prepare(city, &raw, days)
    }
}
