mod common;

use chrono::Duration;
use pm_forecast::error::ForecastError;
use pm_forecast::models::{
    AdditiveSeasonal, Algorithm, DefaultTrainer, FitOptions, FittedModel, ForecastModel,
    ModelTrainer, SeasonalArima, SeasonalComponent, TrainedForecastModel, Verbosity,
};
use rstest::rstest;
use series_math::MathError;

#[rstest]
#[case(Algorithm::SeasonalArima)]
#[case(Algorithm::AdditiveSeasonal)]
fn test_trainer_forecast_bands(#[case] algorithm: Algorithm) {
    let series = common::synthetic_series("Colombo", 24 * 14, 3);
    let model = DefaultTrainer
        .fit(algorithm, &series, &FitOptions::default())
        .unwrap();

    assert_eq!(model.algorithm(), algorithm);
    assert_eq!(model.last_timestamp(), common::end_time());

    let forecast = model.forecast(72).unwrap();
    assert_eq!(forecast.len(), 72);
    for step in &forecast {
        assert!(step.mean.is_finite());
        assert!(step.lower <= step.mean, "{:?}", step);
        assert!(step.mean <= step.upper, "{:?}", step);
    }
}

#[rstest]
#[case(Algorithm::SeasonalArima)]
#[case(Algorithm::AdditiveSeasonal)]
fn test_forecast_tracks_level(#[case] algorithm: Algorithm) {
    let series = common::synthetic_series("Colombo", 24 * 21, 5);
    let model = DefaultTrainer
        .fit(algorithm, &series, &FitOptions::new(Verbosity::Quiet))
        .unwrap();

    let forecast = model.forecast(24).unwrap();
    let mean = forecast.iter().map(|f| f.mean).sum::<f64>() / forecast.len() as f64;
    // Synthetic series oscillates around 40
    assert!(mean > 20.0 && mean < 60.0, "mean forecast {}", mean);
}

#[rstest]
#[case(Algorithm::SeasonalArima, 49)]
#[case(Algorithm::AdditiveSeasonal, 47)]
fn test_too_short_series_fails(#[case] algorithm: Algorithm, #[case] hours: usize) {
    let series = common::synthetic_series("Colombo", hours, 1);
    let err = DefaultTrainer
        .fit(algorithm, &series, &FitOptions::default())
        .unwrap_err();

    match err {
        ForecastError::ModelFit {
            algorithm: failed,
            source: MathError::InsufficientData(_),
        } => assert_eq!(failed, algorithm),
        other => panic!("Expected ModelFit, got {:?}", other),
    }
}

#[test]
fn test_seasonal_arima_interval_widens() {
    let series = common::synthetic_series("Colombo", 24 * 10, 9);
    let model = SeasonalArima::default()
        .train(&series, &FitOptions::default())
        .unwrap();

    let forecast = model.forecast(48).unwrap();
    let width = |i: usize| forecast[i].upper - forecast[i].lower;
    assert!(width(0) > 0.0);
    assert!(width(47) >= width(0));
    assert_eq!(model.name(), "SARIMA(1,1,1)(1,0,1)[24]");
}

#[test]
fn test_additive_custom_seasonality() {
    let series = common::synthetic_series("Colombo", 24 * 10, 2);
    let model = AdditiveSeasonal::new(vec![SeasonalComponent::daily()])
        .with_changepoints(5)
        .train(&series, &FitOptions::default())
        .unwrap();

    assert_eq!(model.changepoints().len(), 5);
    assert_eq!(model.seasonalities().len(), 1);
    assert!(model.residual_std() > 0.0);
    assert_eq!(model.forecast(5).unwrap().len(), 5);
}

#[test]
fn test_default_additive_components() {
    let names: Vec<String> = AdditiveSeasonal::default()
        .seasonalities()
        .iter()
        .map(|c| c.name.clone())
        .collect();
    assert_eq!(names, vec!["daily", "weekly", "hourly"]);
}

#[test]
fn test_fitted_model_forecast_starts_after_training() {
    let series = common::synthetic_series("Galle", 24 * 8, 4);
    let model = SeasonalArima::default()
        .train(&series, &FitOptions::default())
        .unwrap();
    let fitted = FittedModel::SeasonalArima(model);

    let timestamps = pm_forecast::utils::future_timestamps(fitted.last_timestamp(), 3);
    assert_eq!(timestamps[0], common::end_time() + Duration::hours(1));
}

#[rstest]
#[case("sarima", Algorithm::SeasonalArima)]
#[case("SARIMAX", Algorithm::SeasonalArima)]
#[case("additive", Algorithm::AdditiveSeasonal)]
#[case(" prophet ", Algorithm::AdditiveSeasonal)]
fn test_algorithm_parsing(#[case] raw: &str, #[case] expected: Algorithm) {
    assert_eq!(raw.parse::<Algorithm>().unwrap(), expected);
}

#[test]
fn test_unknown_algorithm() {
    assert!(matches!(
        "lstm".parse::<Algorithm>(),
        Err(ForecastError::InvalidParameter(_))
    ));
    assert_eq!(Algorithm::SeasonalArima.to_string(), "sarima");
    assert_eq!(Algorithm::AdditiveSeasonal.tag(), "additive");
}
