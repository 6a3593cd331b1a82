use pm_forecast::error::ForecastError;
use pm_forecast::models::Algorithm;
use series_math::MathError;
use std::error::Error;
use std::io;
use std::time::Duration;

#[test]
fn test_error_conversion() {
    // Test IO error conversion
    let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
    let forecast_error = ForecastError::from(io_error);

    match forecast_error {
        ForecastError::IoError(_) => {}
        _ => panic!("Expected IoError variant"),
    }

    // Malformed settings surface as config errors
    let json_error = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
    match ForecastError::from(json_error) {
        ForecastError::Config(_) => {}
        other => panic!("Expected Config variant, got {:?}", other),
    }
}

#[test]
fn test_error_display() {
    let error = ForecastError::NoData {
        city: "Kandy".to_string(),
        days: 30,
    };
    assert_eq!(
        error.to_string(),
        "No data found for Kandy in last 30 days. Run ingestion first."
    );

    let error = ForecastError::InsufficientData {
        city: "Galle".to_string(),
        needed_hours: 192,
        available_hours: 168,
    };
    let message = error.to_string();
    assert!(message.contains("Galle"));
    assert!(message.contains("192"));
    assert!(message.contains("168"));

    let error = ForecastError::BacktestEmpty {
        city: "Colombo".to_string(),
        checkpoints: 22,
    };
    assert!(error.to_string().contains("no valid predictions"));

    let error = ForecastError::Timeout {
        operation: "sarima fit for Colombo".to_string(),
        budget: Duration::from_secs(5),
    };
    assert!(error.to_string().contains("sarima fit for Colombo"));
}

#[test]
fn test_model_fit_keeps_cause() {
    let error = ForecastError::ModelFit {
        algorithm: Algorithm::SeasonalArima,
        source: MathError::NotConverged {
            iterations: 5000,
            objective: 12.5,
        },
    };

    assert!(error.to_string().contains("sarima"));
    let source = error.source().expect("ModelFit carries its cause");
    assert!(source.downcast_ref::<MathError>().is_some());
}
