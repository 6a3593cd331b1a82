mod common;

use common::{CountingTrainer, FailingTrainer};
use pm_forecast::backtest::{checkpoints, Backtester};
use pm_forecast::error::ForecastError;
use pm_forecast::models::Algorithm;
use pm_forecast::repository::InMemoryRepository;
use std::sync::Arc;
use tempfile::TempDir;

fn backtester(algorithm: Algorithm) -> (Backtester, Arc<CountingTrainer>, TempDir) {
    let dir = TempDir::new().unwrap();
    let trainer = Arc::new(CountingTrainer::default());
    let backtester = Backtester::new(
        Arc::new(common::sample_repository()),
        common::test_settings(dir.path(), algorithm),
    )
    .with_trainer(trainer.clone());
    (backtester, trainer, dir)
}

#[test]
fn test_thirty_day_roll() {
    let (backtester, trainer, dir) = backtester(Algorithm::AdditiveSeasonal);

    let result = backtester.backtest_roll("Colombo", 30, 24).unwrap();

    assert_eq!(result.city, "Colombo");
    assert_eq!(result.days, 30);
    assert_eq!(result.horizon_hours, 24);
    assert_eq!(result.n_checkpoints, 22);
    assert_eq!(result.n_predictions, 22 * 24);
    assert_eq!(result.failed_checkpoints, 0);
    assert_eq!(result.algorithm, Algorithm::AdditiveSeasonal);
    assert_eq!(trainer.calls(), 22);

    assert!(result.mae >= 0.0);
    assert!(result.rmse >= result.mae);
    // Noise has a standard deviation of 2, the model should do far better
    // than the daily swing of 24
    assert!(result.mae < 12.0, "mae {}", result.mae);

    // Backtests never write models
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_seasonal_arima_roll() {
    let (backtester, _, _dir) = backtester(Algorithm::SeasonalArima);
    let result = backtester.backtest_roll("Galle", 14, 48).unwrap();

    // 336 hours: cuts 168, 192, ..., 264
    assert_eq!(result.n_checkpoints, 5);
    assert_eq!(result.failed_checkpoints, 0);
    assert_eq!(result.n_predictions, 5 * 48);
    assert!(result.mae >= 0.0 && result.rmse >= result.mae);
}

#[test]
fn test_checkpoint_positions() {
    let cuts = checkpoints(720, 24, Algorithm::SeasonalArima);
    let expected: Vec<usize> = (0..22).map(|k| 168 + 24 * k).collect();
    assert_eq!(cuts, expected);
    assert!(cuts.iter().all(|&cut| cut < 720 - 24));
}

#[test]
fn test_insufficient_history() {
    let (backtester, trainer, _dir) = backtester(Algorithm::SeasonalArima);

    let err = backtester.backtest_roll("Colombo", 7, 24).unwrap_err();
    match err {
        ForecastError::InsufficientData {
            city,
            needed_hours,
            available_hours,
        } => {
            assert_eq!(city, "Colombo");
            assert_eq!(needed_hours, 168 + 24);
            assert_eq!(available_hours, 168);
        }
        other => panic!("Expected InsufficientData, got {:?}", other),
    }
    assert_eq!(trainer.calls(), 0);
}

#[test]
fn test_no_data() {
    let (backtester, _, _dir) = backtester(Algorithm::SeasonalArima);
    assert!(matches!(
        backtester.backtest_roll("Kandy", 30, 24),
        Err(ForecastError::NoData { .. })
    ));
}

#[test]
fn test_all_checkpoints_failing() {
    let dir = TempDir::new().unwrap();
    let backtester = Backtester::new(
        Arc::new(common::sample_repository()),
        common::test_settings(dir.path(), Algorithm::SeasonalArima),
    )
    .with_trainer(Arc::new(FailingTrainer));

    match backtester.backtest_roll("Galle", 14, 24) {
        Err(ForecastError::BacktestEmpty { city, checkpoints }) => {
            assert_eq!(city, "Galle");
            assert_eq!(checkpoints, 6);
        }
        other => panic!("Expected BacktestEmpty, got {:?}", other),
    }
}

#[test]
fn test_zero_horizon_rejected() {
    let repository =
        InMemoryRepository::new().with_city("Colombo", common::synthetic_samples(30, 1));
    let dir = TempDir::new().unwrap();
    let backtester = Backtester::new(
        Arc::new(repository),
        common::test_settings(dir.path(), Algorithm::SeasonalArima),
    );
    assert!(matches!(
        backtester.backtest_roll("Colombo", 30, 0),
        Err(ForecastError::InvalidParameter(_))
    ));
}
