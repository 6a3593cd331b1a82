//! Access to the historical measurement store
//!
//! The store itself is filled by the upstream ingestion pipeline. This crate
//! only reads the single aggregated PM2.5 stream per city.

use crate::data::RawSample;
use crate::error::Result;
use crate::utils::parse_timestamp;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Source tag of the canonical, de-duplicated measurement stream
pub const AGGREGATED_SOURCE: &str = "aggregated";

/// Read access to hourly pollutant readings
pub trait SeriesRepository: Send + Sync {
    /// Readings for `city` over the last `lookback_days`, ordered by time.
    ///
    /// Returns an empty vector when the store has no rows.
    fn query_series(&self, city: &str, lookback_days: u32) -> Result<Vec<RawSample>>;
}

fn city_key(city: &str) -> String {
    city.trim().to_lowercase()
}

/// Keep samples inside the lookback window `(anchor - days, anchor]`, where
/// the anchor is `as_of` or the newest sample when no reference time is
/// pinned. A dense hourly store yields exactly `days * 24` readings.
fn window(
    mut samples: Vec<RawSample>,
    lookback_days: u32,
    as_of: Option<DateTime<Utc>>,
) -> Vec<RawSample> {
    samples.sort_by_key(|s| s.ts);
    let anchor = match as_of.or_else(|| samples.last().map(|s| s.ts)) {
        Some(anchor) => anchor,
        None => return samples,
    };
    let start = anchor - Duration::days(lookback_days as i64);
    samples.retain(|s| s.ts > start && s.ts <= anchor);
    samples
}

/// Measurement store held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    series: HashMap<String, Vec<RawSample>>,
    as_of: Option<DateTime<Utc>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the end of every lookback window instead of using the newest sample
    pub fn with_as_of(mut self, as_of: DateTime<Utc>) -> Self {
        self.as_of = Some(as_of);
        self
    }

    /// Append readings for a city
    pub fn insert(&mut self, city: &str, samples: impl IntoIterator<Item = RawSample>) {
        self.series
            .entry(city_key(city))
            .or_default()
            .extend(samples);
    }

    /// Builder form of [`InMemoryRepository::insert`]
    pub fn with_city(mut self, city: &str, samples: impl IntoIterator<Item = RawSample>) -> Self {
        self.insert(city, samples);
        self
    }
}

impl SeriesRepository for InMemoryRepository {
    fn query_series(&self, city: &str, lookback_days: u32) -> Result<Vec<RawSample>> {
        let samples = self.series.get(&city_key(city)).cloned().unwrap_or_default();
        Ok(window(samples, lookback_days, self.as_of))
    }
}

#[derive(Debug, Deserialize)]
struct MeasurementRecord {
    city: String,
    ts: String,
    pm25: Option<f64>,
    #[serde(default)]
    source: Option<String>,
}

/// Measurement store exported as CSV with columns `city,ts,pm25,source`.
///
/// Rows whose `source` is present and not `aggregated` are ignored. The file
/// is read on every query so a running process sees fresh exports.
#[derive(Debug, Clone)]
pub struct CsvRepository {
    path: PathBuf,
    as_of: Option<DateTime<Utc>>,
}

impl CsvRepository {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            as_of: None,
        }
    }

    pub fn with_as_of(mut self, as_of: DateTime<Utc>) -> Self {
        self.as_of = Some(as_of);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SeriesRepository for CsvRepository {
    fn query_series(&self, city: &str, lookback_days: u32) -> Result<Vec<RawSample>> {
        let wanted = city_key(city);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(&self.path)?;

        let mut samples = Vec::new();
        for record in reader.deserialize::<MeasurementRecord>() {
            let record = record?;
            if city_key(&record.city) != wanted {
                continue;
            }
            if let Some(source) = record.source.as_deref() {
                if !source.is_empty() && source != AGGREGATED_SOURCE {
                    continue;
                }
            }
            samples.push(RawSample {
                ts: parse_timestamp(&record.ts)?,
                pm25: record.pm25,
            });
        }

        log::debug!(
            "csv store path={} city={} rows={}",
            self.path.display(),
            city,
            samples.len()
        );
        Ok(window(samples, lookback_days, self.as_of))
    }
}
