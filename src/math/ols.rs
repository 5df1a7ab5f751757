//! Least squares solver.
//!
//! Calibration fits are tiny (two columns, a handful of rows), so we build the
//! design matrix explicitly and solve it with SVD. SVD handles tall matrices
//! and reports rank deficiency instead of panicking.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Degree-1 polynomial fit `y = c0 + c1 * x`.
///
/// Returns `(c0, c1)`, or `None` when the inputs are mismatched, fewer than
/// two rows, or the solve fails.
pub fn fit_line(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }

    let n = x.len();
    let design = DMatrix::from_fn(n, 2, |r, c| if c == 0 { 1.0 } else { x[r] });
    let rhs = DVector::from_column_slice(y);

    let beta = solve_least_squares(&design, &rhs)?;
    Some((beta[0], beta[1]))
}
