//! Least-squares solves for small dense systems.
//!
//! The QP subproblems assemble KKT matrices of the form
//!
//! ```text
//! [ B_FF  E_Fᵀ ] [ p ]   [ -q_F ]
//! [ E_F   0    ] [ λ ] = [  0   ]
//! ```
//!
//! which become singular when an equality row has no free variable left
//! (every weight pinned at a bound). SVD gives the minimum-norm solution in
//! that case instead of failing, so a single solver serves both regular and
//! degenerate working sets.

use nalgebra::{DMatrix, DVector};

/// Solve `a · x ≈ b` in the least-squares sense using SVD.
///
/// Returns `None` if no tolerance yields a finite solution.
pub fn solve_least_squares(a: &DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = a.clone().svd(true, true);

    // Progressively looser singular-value cutoffs, relative to the largest one.
    let sigma_max = svd.singular_values.max();
    for &rel in &[1e-13, 1e-10, 1e-7] {
        let tol = (rel * sigma_max).max(f64::MIN_POSITIVE);
        if let Ok(x) = svd.solve(b, tol) {
            if x.iter().all(|v| v.is_finite()) {
                return Some(x);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn singular_system_gets_minimum_norm_solution() {
        // Second unknown has no influence: min-norm answer leaves it at zero.
        let a = DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 0.0]);
        let b = DVector::from_row_slice(&[4.0, 0.0]);
        let x = solve_least_squares(&a, &b).unwrap();
        assert!((x[0] - 2.0).abs() < 1e-12);
        assert!(x[1].abs() < 1e-12);
    }
}
