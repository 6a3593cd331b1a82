mod common;

use chrono::Duration;
use common::{CountingTrainer, FailingTrainer};
use pm_forecast::cache::{CachePolicy, ModelCache};
use pm_forecast::error::ForecastError;
use pm_forecast::forecaster::Forecaster;
use pm_forecast::models::Algorithm;
use pm_forecast::repository::InMemoryRepository;
use rstest::rstest;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn forecaster(dir: &TempDir, algorithm: Algorithm) -> (Forecaster, Arc<CountingTrainer>) {
    let trainer = Arc::new(CountingTrainer::default());
    let cache = Arc::new(ModelCache::new(dir.path()).unwrap());
    let forecaster = Forecaster::new(
        Arc::new(common::sample_repository()),
        cache,
        common::test_settings(dir.path(), algorithm),
    )
    .with_trainer(trainer.clone());
    (forecaster, trainer)
}

#[rstest]
#[case(Algorithm::SeasonalArima)]
#[case(Algorithm::AdditiveSeasonal)]
fn test_three_day_forecast(#[case] algorithm: Algorithm) {
    let dir = TempDir::new().unwrap();
    let (forecaster, _) = forecaster(&dir, algorithm);

    let result = forecaster.forecast_city("Colombo", 3, 30, false).unwrap();

    assert_eq!(result.city, "Colombo");
    assert_eq!(result.horizon_hours, 72);
    assert_eq!(result.series.len(), 72);
    assert_eq!(result.algorithm, algorithm);
    assert!(!result.from_cache);

    assert_eq!(
        result.series[0].ts,
        common::end_time() + Duration::hours(1)
    );
    for pair in result.series.windows(2) {
        assert_eq!(pair[1].ts - pair[0].ts, Duration::hours(1));
    }
    for point in &result.series {
        assert!(point.yhat_lower <= point.yhat);
        assert!(point.yhat <= point.yhat_upper);
    }
}

#[test]
fn test_city_without_data() {
    let dir = TempDir::new().unwrap();
    let (forecaster, trainer) = forecaster(&dir, Algorithm::SeasonalArima);

    let err = forecaster.forecast_city("Kandy", 7, 30, true).unwrap_err();
    match &err {
        ForecastError::NoData { city, days } => {
            assert_eq!(city, "Kandy");
            assert_eq!(*days, 30);
        }
        other => panic!("Expected NoData, got {:?}", other),
    }
    assert!(err.to_string().contains("Kandy"));
    assert!(err.to_string().contains("30 days"));
    assert_eq!(trainer.calls(), 0);
}

#[test]
fn test_cached_model_is_reused() {
    let dir = TempDir::new().unwrap();
    let (forecaster, trainer) = forecaster(&dir, Algorithm::AdditiveSeasonal);

    let first = forecaster.forecast_city("Colombo", 1, 30, true).unwrap();
    assert_eq!(trainer.calls(), 1);
    assert!(!first.from_cache);

    let second = forecaster.forecast_city("Colombo", 2, 30, true).unwrap();
    assert_eq!(trainer.calls(), 1);
    assert!(second.from_cache);
    assert_eq!(second.series.len(), 48);
    assert_eq!(second.series[..24], first.series[..]);
}

#[test]
fn test_fresh_fit_still_warms_cache() {
    let dir = TempDir::new().unwrap();
    let (forecaster, trainer) = forecaster(&dir, Algorithm::AdditiveSeasonal);

    forecaster.forecast_city("Colombo", 1, 30, false).unwrap();
    assert!(forecaster
        .cache()
        .path_for("Colombo", Algorithm::AdditiveSeasonal)
        .exists());

    // Bypassing the cache always retrains
    forecaster.forecast_city("Colombo", 1, 30, false).unwrap();
    assert_eq!(trainer.calls(), 2);

    let cached = forecaster.forecast_city("Colombo", 1, 30, true).unwrap();
    assert!(cached.from_cache);
    assert_eq!(trainer.calls(), 2);
}

#[test]
fn test_corrupted_artifact_triggers_one_retrain() {
    let dir = TempDir::new().unwrap();
    let (forecaster, trainer) = forecaster(&dir, Algorithm::AdditiveSeasonal);
    let path = forecaster
        .cache()
        .path_for("Colombo", Algorithm::AdditiveSeasonal);
    fs::write(&path, b"PMFC garbage that is not a model").unwrap();

    let result = forecaster.forecast_city("Colombo", 1, 30, true).unwrap();
    assert_eq!(result.series.len(), 24);
    assert!(!result.from_cache);
    assert_eq!(trainer.calls(), 1);

    // The retrained artifact replaced the corrupted one
    let again = forecaster.forecast_city("Colombo", 1, 30, true).unwrap();
    assert!(again.from_cache);
    assert_eq!(trainer.calls(), 1);
}

#[test]
fn test_cache_policy_forces_retrain_on_new_window() {
    let dir = TempDir::new().unwrap();
    let trainer = Arc::new(CountingTrainer::default());
    let cache = Arc::new(
        ModelCache::new(dir.path())
            .unwrap()
            .with_policy(CachePolicy {
                match_train_days: true,
                max_age_hours: None,
            }),
    );
    let forecaster = Forecaster::new(
        Arc::new(common::sample_repository()),
        cache,
        common::test_settings(dir.path(), Algorithm::AdditiveSeasonal),
    )
    .with_trainer(trainer.clone());

    forecaster.forecast_city("Colombo", 1, 30, true).unwrap();
    forecaster.forecast_city("Colombo", 1, 14, true).unwrap();
    assert_eq!(trainer.calls(), 2);
    forecaster.forecast_city("Colombo", 1, 14, true).unwrap();
    assert_eq!(trainer.calls(), 2);
}

#[test]
fn test_unwritable_cache_does_not_fail_forecast() {
    let dir = TempDir::new().unwrap();
    let (forecaster, _) = forecaster(&dir, Algorithm::AdditiveSeasonal);
    // A directory where the artifact file should go makes the rename fail
    fs::create_dir(
        forecaster
            .cache()
            .path_for("Colombo", Algorithm::AdditiveSeasonal),
    )
    .unwrap();

    let result = forecaster.forecast_city("Colombo", 1, 30, false).unwrap();
    assert_eq!(result.series.len(), 24);
}

#[rstest]
#[case(0, 30)]
#[case(3, 0)]
fn test_rejects_empty_windows(#[case] horizon_days: u32, #[case] train_days: u32) {
    let dir = TempDir::new().unwrap();
    let (forecaster, _) = forecaster(&dir, Algorithm::SeasonalArima);
    assert!(matches!(
        forecaster.forecast_city("Colombo", horizon_days, train_days, false),
        Err(ForecastError::InvalidParameter(_))
    ));
}

#[test]
fn test_fit_failure_propagates() {
    let dir = TempDir::new().unwrap();
    let forecaster = Forecaster::new(
        Arc::new(common::sample_repository()),
        Arc::new(ModelCache::new(dir.path()).unwrap()),
        common::test_settings(dir.path(), Algorithm::SeasonalArima),
    )
    .with_trainer(Arc::new(FailingTrainer));

    let err = forecaster.forecast_city("Colombo", 1, 30, false).unwrap_err();
    assert!(matches!(
        err,
        ForecastError::ModelFit {
            algorithm: Algorithm::SeasonalArima,
            ..
        }
    ));
    assert!(!forecaster
        .cache()
        .path_for("Colombo", Algorithm::SeasonalArima)
        .exists());
}

#[test]
fn test_short_history_is_a_fit_error() {
    let dir = TempDir::new().unwrap();
    let repository = InMemoryRepository::new().with_city(
        "Jaffna",
        common::synthetic_samples(1, 3),
    );
    let forecaster = Forecaster::new(
        Arc::new(repository),
        Arc::new(ModelCache::new(dir.path()).unwrap()),
        common::test_settings(dir.path(), Algorithm::SeasonalArima),
    );

    assert!(matches!(
        forecaster.forecast_city("Jaffna", 1, 30, false),
        Err(ForecastError::ModelFit { .. })
    ));
}
