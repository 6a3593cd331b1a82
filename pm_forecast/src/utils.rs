//! Utility functions for the pm_forecast crate

use crate::error::{ForecastError, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;

/// Hourly timestamps following `last_timestamp`
pub fn future_timestamps(last_timestamp: DateTime<Utc>, horizon: usize) -> Vec<DateTime<Utc>> {
    (1..=horizon)
        .map(|h| last_timestamp + Duration::hours(h as i64))
        .collect()
}

/// Parse a store timestamp.
///
/// Accepts RFC 3339 (`2024-03-01T05:00:00Z`), the store's naive UTC format
/// (`2024-03-01 05:00:00`, optionally with a `T`), and bare dates.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }
    Err(ForecastError::Repository(format!(
        "Unrecognised timestamp: {}",
        raw
    )))
}

/// Run `job` under a wall-clock budget.
///
/// Without a budget the job runs on the calling thread. With one, it runs on
/// a helper thread and the caller gives up after `budget`; the abandoned job
/// finishes in the background and its result is dropped.
pub fn run_with_budget<T, F>(operation: &str, budget: Option<std::time::Duration>, job: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let budget = match budget {
        Some(budget) => budget,
        None => return job(),
    };

    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name(format!("pmcast-{}", operation.replace(' ', "-")))
        .spawn(move || {
            // The receiver is gone when the caller already timed out
            let _ = tx.send(job());
        })?;

    match rx.recv_timeout(budget) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(ForecastError::Timeout {
            operation: operation.to_string(),
            budget,
        }),
        Err(RecvTimeoutError::Disconnected) => Err(ForecastError::WorkerLost(operation.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_future_timestamps_are_hourly() {
        let last = Utc.with_ymd_and_hms(2024, 1, 1, 23, 0, 0).unwrap();
        let ts = future_timestamps(last, 3);
        assert_eq!(ts.len(), 3);
        assert_eq!(ts[0], Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());
        assert_eq!(ts[2], Utc.with_ymd_and_hms(2024, 1, 2, 2, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 5, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-01 05:00:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-03-01T05:00:00Z").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-03-01T10:30:00+05:30").unwrap(), expected);
        assert_eq!(
            parse_timestamp("2024-03-01").unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
        );
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_budget_passes_result_through() {
        let value = run_with_budget("quick job", Some(std::time::Duration::from_secs(5)), || Ok(7))
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(run_with_budget("inline job", None, || Ok(3)).unwrap(), 3);
    }

    #[test]
    fn test_budget_times_out() {
        let result: Result<()> = run_with_budget(
            "slow job",
            Some(std::time::Duration::from_millis(20)),
            || {
                thread::sleep(std::time::Duration::from_millis(500));
                Ok(())
            },
        );
        assert!(matches!(result, Err(ForecastError::Timeout { .. })));
    }
}
