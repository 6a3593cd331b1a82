//! Derivative-free minimisation used for conditional sum-of-squares fitting
//!
//! Contains a bounded Nelder-Mead simplex search. Bounds are enforced by
//! clamping every trial vertex, which keeps the search inside a box without
//! transforming the parameter space.

use crate::{MathError, Result};

/// Configuration for a Nelder-Mead run
#[derive(Debug, Clone)]
pub struct NelderMeadConfig {
    /// Maximum number of simplex iterations
    pub max_iter: usize,
    /// Relative spread of objective values across the simplex at convergence
    pub f_tolerance: f64,
    /// Absolute spread of vertices around the best vertex at convergence
    pub x_tolerance: f64,
    /// Initial simplex step, scaled by the magnitude of each coordinate
    pub initial_step: f64,
    /// Reflection coefficient
    pub alpha: f64,
    /// Expansion coefficient
    pub gamma: f64,
    /// Contraction coefficient
    pub rho: f64,
    /// Shrink coefficient
    pub sigma: f64,
    /// Emit per-iteration progress at trace level
    pub trace: bool,
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self {
            max_iter: 2000,
            f_tolerance: 1e-10,
            x_tolerance: 1e-6,
            initial_step: 0.05,
            alpha: 1.0,
            gamma: 2.0,
            rho: 0.5,
            sigma: 0.5,
            trace: false,
        }
    }
}

/// Outcome of a Nelder-Mead run
#[derive(Debug, Clone)]
pub struct NelderMeadResult {
    /// Best point found
    pub point: Vec<f64>,
    /// Objective value at `point`
    pub value: f64,
    /// Iterations performed
    pub iterations: usize,
    /// Whether both tolerances were met before `max_iter`
    pub converged: bool,
}

/// Minimise `objective` starting from `initial`.
///
/// Non-finite objective values are treated as `f64::MAX` so the simplex
/// moves away from them. An objective that is non-finite at the starting
/// point is rejected with [`MathError::CalculationError`].
pub fn nelder_mead<F>(
    objective: F,
    initial: &[f64],
    bounds: Option<&[(f64, f64)]>,
    config: &NelderMeadConfig,
) -> Result<NelderMeadResult>
where
    F: Fn(&[f64]) -> f64,
{
    let n = initial.len();
    if n == 0 {
        return Err(MathError::InvalidInput(
            "Nelder-Mead needs at least one parameter".to_string(),
        ));
    }
    if let Some(b) = bounds {
        if b.len() != n {
            return Err(MathError::InvalidInput(format!(
                "Expected {} bounds, got {}",
                n,
                b.len()
            )));
        }
        if b.iter().any(|(lo, hi)| lo > hi) {
            return Err(MathError::InvalidInput(
                "Lower bound exceeds upper bound".to_string(),
            ));
        }
    }

    let clamp = |x: &mut Vec<f64>| {
        if let Some(b) = bounds {
            for (v, (lo, hi)) in x.iter_mut().zip(b.iter()) {
                *v = v.clamp(*lo, *hi);
            }
        }
    };
    let eval = |x: &[f64]| {
        let f = objective(x);
        if f.is_finite() {
            f
        } else {
            f64::MAX
        }
    };

    let mut start = initial.to_vec();
    clamp(&mut start);
    let f_start = objective(&start);
    if !f_start.is_finite() {
        return Err(MathError::CalculationError(
            "Objective is not finite at the starting point".to_string(),
        ));
    }

    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    let mut values: Vec<f64> = Vec::with_capacity(n + 1);
    simplex.push(start.clone());
    values.push(f_start);

    for i in 0..n {
        let step = config.initial_step * start[i].abs().max(1.0);
        let mut vertex = start.clone();
        vertex[i] += step;
        clamp(&mut vertex);
        if (vertex[i] - start[i]).abs() < f64::EPSILON {
            // Pinned against the upper bound, step the other way
            vertex[i] = start[i] - step;
            clamp(&mut vertex);
        }
        values.push(eval(&vertex));
        simplex.push(vertex);
    }

    let mut iterations = 0;
    let mut converged = false;

    while iterations < config.max_iter {
        // Order vertices best to worst
        let mut order: Vec<usize> = (0..=n).collect();
        order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
        simplex = order.iter().map(|&i| simplex[i].clone()).collect();
        values = order.iter().map(|&i| values[i]).collect();

        let f_best = values[0];
        let f_spread = values[n] - f_best;
        let x_spread = simplex[1..]
            .iter()
            .flat_map(|v| v.iter().zip(simplex[0].iter()).map(|(a, b)| (a - b).abs()))
            .fold(0.0_f64, f64::max);

        if config.trace {
            log::trace!(
                "nelder-mead iter={} best={:.6e} f_spread={:.3e} x_spread={:.3e}",
                iterations,
                f_best,
                f_spread,
                x_spread
            );
        }

        if f_spread <= config.f_tolerance * (1.0 + f_best.abs()) && x_spread <= config.x_tolerance
        {
            converged = true;
            break;
        }

        iterations += 1;

        let mut centroid = vec![0.0; n];
        for vertex in &simplex[..n] {
            for (c, v) in centroid.iter_mut().zip(vertex.iter()) {
                *c += v / n as f64;
            }
        }

        let along = |towards: &[f64], coef: f64| -> Vec<f64> {
            let mut p: Vec<f64> = centroid
                .iter()
                .zip(towards.iter())
                .map(|(c, t)| c + coef * (t - c))
                .collect();
            clamp(&mut p);
            p
        };

        let reflected = along(&simplex[n], -config.alpha);
        let f_reflected = eval(&reflected);

        if f_reflected < values[0] {
            let expanded = along(&reflected, config.gamma);
            let f_expanded = eval(&expanded);
            if f_expanded < f_reflected {
                simplex[n] = expanded;
                values[n] = f_expanded;
            } else {
                simplex[n] = reflected;
                values[n] = f_reflected;
            }
            continue;
        }

        if f_reflected < values[n - 1] {
            simplex[n] = reflected;
            values[n] = f_reflected;
            continue;
        }

        let (contracted, threshold) = if f_reflected < values[n] {
            (along(&reflected, config.rho), f_reflected)
        } else {
            (along(&simplex[n], config.rho), values[n])
        };
        let f_contracted = eval(&contracted);

        if f_contracted < threshold {
            simplex[n] = contracted;
            values[n] = f_contracted;
            continue;
        }

        // Shrink towards the best vertex
        let best = simplex[0].clone();
        for i in 1..=n {
            let mut shrunk: Vec<f64> = best
                .iter()
                .zip(simplex[i].iter())
                .map(|(b, v)| b + config.sigma * (v - b))
                .collect();
            clamp(&mut shrunk);
            values[i] = eval(&shrunk);
            simplex[i] = shrunk;
        }
    }

    let best = (0..=n)
        .min_by(|&a, &b| values[a].total_cmp(&values[b]))
        .unwrap_or(0);

    Ok(NelderMeadResult {
        point: simplex[best].clone(),
        value: values[best],
        iterations,
        converged,
    })
}
