//! Fourier basis terms for seasonal regression

use std::f64::consts::PI;

/// Sine and cosine pairs for harmonics `1..=order` of a cycle of length
/// `period`, evaluated at `t` (same unit as `period`).
///
/// Output layout is `[sin(1), cos(1), sin(2), cos(2), ...]`.
pub fn fourier_terms(t: f64, period: f64, order: usize) -> Vec<f64> {
    let mut terms = Vec::with_capacity(order * 2);
    for k in 1..=order {
        let angle = 2.0 * PI * k as f64 * t / period;
        terms.push(angle.sin());
        terms.push(angle.cos());
    }
    terms
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_layout_and_periodicity() {
        let a = fourier_terms(3.0, 24.0, 2);
        let b = fourier_terms(27.0, 24.0, 2);
        assert_eq!(a.len(), 4);
        for (x, y) in a.iter().zip(b.iter()) {
            assert_relative_eq!(x, y, epsilon = 1e-9);
        }
        let zero = fourier_terms(0.0, 24.0, 1);
        assert_relative_eq!(zero[0], 0.0);
        assert_relative_eq!(zero[1], 1.0);
    }
}
