//! # Aircast
//!
//! Umbrella crate for the PM2.5 forecasting workspace.
//!
//! - [`series_math`]: numerical building blocks (optimisation, least squares,
//!   interpolation, Fourier terms, normal quantiles, accuracy)
//! - [`pm_forecast`]: series preparation, models, model cache, forecasting,
//!   backtesting and multi-city runs
//!
//! ## Example
//!
//! ```
//! use aircast_workspace::pm_forecast::models::Algorithm;
//!
//! let algorithm: Algorithm = "sarima".parse().unwrap();
//! assert_eq!(algorithm.tag(), "sarima");
//! ```

pub use pm_forecast;
pub use series_math;

/// Model families available in this build
pub fn algorithms() -> [pm_forecast::Algorithm; 2] {
    pm_forecast::Algorithm::all()
}
