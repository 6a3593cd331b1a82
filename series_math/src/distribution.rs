//! Normal quantiles for interval construction

use crate::{MathError, Result};
use statrs::distribution::{ContinuousCDF, Normal};

/// Quantile of the standard normal distribution
pub fn normal_quantile(p: f64) -> Result<f64> {
    if !(p > 0.0 && p < 1.0) {
        return Err(MathError::InvalidInput(format!(
            "Probability must be in (0, 1), got {}",
            p
        )));
    }
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| MathError::CalculationError(format!("Standard normal unavailable: {}", e)))?;
    Ok(normal.inverse_cdf(p))
}

/// Two-sided z multiplier for a central interval of the given width.
///
/// A width of 0.8 leaves 0.1 in each tail and gives z ≈ 1.2816.
pub fn interval_z(width: f64) -> Result<f64> {
    if !(width > 0.0 && width < 1.0) {
        return Err(MathError::InvalidInput(format!(
            "Interval width must be in (0, 1), got {}",
            width
        )));
    }
    normal_quantile(0.5 + width / 2.0)
}
