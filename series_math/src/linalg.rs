//! Small dense linear algebra for penalised least squares

use crate::{MathError, Result};

/// Solve `a * x = b` for a symmetric positive definite `a` using Cholesky
/// decomposition.
pub fn cholesky_solve(a: &[Vec<f64>], b: &[f64]) -> Result<Vec<f64>> {
    let n = a.len();
    if n == 0 || b.len() != n || a.iter().any(|row| row.len() != n) {
        return Err(MathError::InvalidInput(format!(
            "Expected a square system of size {}, got {} rows and rhs of {}",
            n,
            a.len(),
            b.len()
        )));
    }

    let mut l = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[i][k] * l[j][k]).sum();
            if i == j {
                let diag = a[i][i] - sum;
                if diag <= 0.0 || !diag.is_finite() {
                    return Err(MathError::CalculationError(format!(
                        "Matrix is not positive definite (pivot {} = {})",
                        i, diag
                    )));
                }
                l[i][j] = diag.sqrt();
            } else {
                l[i][j] = (a[i][j] - sum) / l[j][j];
            }
        }
    }

    // Forward substitution: L y = b
    let mut y = vec![0.0; n];
    for i in 0..n {
        let sum: f64 = (0..i).map(|k| l[i][k] * y[k]).sum();
        y[i] = (b[i] - sum) / l[i][i];
    }

    // Back substitution: L^T x = y
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let sum: f64 = (i + 1..n).map(|k| l[k][i] * x[k]).sum();
        x[i] = (y[i] - sum) / l[i][i];
    }

    if x.iter().any(|v| !v.is_finite()) {
        return Err(MathError::CalculationError(
            "Solution contains non-finite values".to_string(),
        ));
    }

    Ok(x)
}

/// Ridge-penalised least squares.
///
/// Minimises `||y - X beta||^2 + sum_j penalties[j] * beta_j^2` where `rows`
/// holds the design matrix row by row.
pub fn ridge_least_squares(rows: &[Vec<f64>], y: &[f64], penalties: &[f64]) -> Result<Vec<f64>> {
    if rows.is_empty() || rows.len() != y.len() {
        return Err(MathError::InvalidInput(format!(
            "Design has {} rows but target has {} values",
            rows.len(),
            y.len()
        )));
    }
    let k = penalties.len();
    if rows.iter().any(|r| r.len() != k) {
        return Err(MathError::InvalidInput(format!(
            "Every design row must have {} columns",
            k
        )));
    }

    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for (row, &target) in rows.iter().zip(y.iter()) {
        for i in 0..k {
            let ri = row[i];
            if ri == 0.0 {
                continue;
            }
            xty[i] += ri * target;
            for j in 0..=i {
                xtx[i][j] += ri * row[j];
            }
        }
    }
    for i in 0..k {
        for j in 0..i {
            xtx[j][i] = xtx[i][j];
        }
        xtx[i][i] += penalties[i];
    }

    cholesky_solve(&xtx, &xty)
}
