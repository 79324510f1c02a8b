//! Convex quadratic subproblem solver.
//!
//! Solves
//!
//! ```text
//! minimize   ½ dᵀ B d + gᵀ d
//! subject to E d = 0
//!            l ≤ d ≤ u
//! ```
//!
//! with a primal active-set method over the bound constraints. The
//! equality rows stay in every KKT system; bounds enter and leave the
//! working set one at a time. `B` must be symmetric positive definite (the
//! SQP driver guarantees this with damped BFGS updates).
//!
//! The start point must already satisfy every constraint. For SQP steps from
//! a feasible iterate `d = 0` always does.

use nalgebra::{DMatrix, DVector};

use crate::math::solve_least_squares;

/// Bound tolerance when deciding whether a coordinate sits on a bound.
const BOUND_EPS: f64 = 1e-14;
/// Relative length below which a working-set step counts as zero.
const STEP_EPS: f64 = 1e-13;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QpError {
    /// The start point violates a bound.
    InfeasibleStart,
    /// A KKT system could not be solved.
    Singular,
    /// The active-set loop did not settle.
    IterationLimit,
}

impl std::fmt::Display for QpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QpError::InfeasibleStart => write!(f, "QP start point violates a bound"),
            QpError::Singular => write!(f, "QP KKT system is singular"),
            QpError::IterationLimit => write!(f, "QP active set did not settle"),
        }
    }
}

/// Borrowed description of one QP subproblem.
#[derive(Debug, Clone, Copy)]
pub struct QpProblem<'a> {
    pub hessian: &'a DMatrix<f64>,
    pub gradient: &'a [f64],
    /// Rows of `E`; each has the problem dimension.
    pub equalities: &'a [Vec<f64>],
    pub lower: &'a [f64],
    pub upper: &'a [f64],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Free,
    Lower,
    Upper,
    /// `l == u`; never released.
    Fixed,
}

/// Solve the QP starting from the feasible point `start`.
pub fn solve_box_eq_qp(problem: &QpProblem<'_>, start: &[f64]) -> Result<Vec<f64>, QpError> {
    let n = start.len();
    let m = problem.equalities.len();
    let b = problem.hessian;

    let mut d = start.to_vec();
    let mut slots = Vec::with_capacity(n);
    for i in 0..n {
        let (lo, hi) = (problem.lower[i], problem.upper[i]);
        if d[i] < lo - BOUND_EPS || d[i] > hi + BOUND_EPS {
            return Err(QpError::InfeasibleStart);
        }
        let slot = if hi - lo <= BOUND_EPS {
            Slot::Fixed
        } else if d[i] <= lo + BOUND_EPS {
            Slot::Lower
        } else if d[i] >= hi - BOUND_EPS {
            Slot::Upper
        } else {
            Slot::Free
        };
        if slot == Slot::Lower || slot == Slot::Fixed {
            d[i] = lo;
        } else if slot == Slot::Upper {
            d[i] = hi;
        }
        slots.push(slot);
    }

    // Each bound can be added and released a bounded number of times in a
    // non-degenerate run; the cap only guards against cycling.
    let max_iter = 10 * (n + m) + 50;

    for _ in 0..max_iter {
        // q = B d + g: gradient of the quadratic at the current point.
        let dv = DVector::from_column_slice(&d);
        let bd = b * &dv;
        let q: Vec<f64> = (0..n).map(|i| bd[i] + problem.gradient[i]).collect();

        let free: Vec<usize> = (0..n).filter(|&i| slots[i] == Slot::Free).collect();
        let nf = free.len();

        let (step, lambda) = solve_kkt(problem, &free, &q, m)?;

        let d_norm = d.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        let step_norm = step.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));

        if step_norm <= STEP_EPS * (1.0 + d_norm) {
            // Stationary on the current working set: check bound multipliers.
            let q_norm = q.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
            let tol = 1e-12 * (1.0 + q_norm);
            let mut release: Option<(usize, f64)> = None;
            for i in 0..n {
                let r = q[i]
                    + problem
                        .equalities
                        .iter()
                        .zip(lambda.iter())
                        .map(|(row, l)| row[i] * l)
                        .sum::<f64>();
                let violation = match slots[i] {
                    Slot::Lower if r < -tol => -r,
                    Slot::Upper if r > tol => r,
                    _ => continue,
                };
                if release.is_none_or(|(_, v)| violation > v) {
                    release = Some((i, violation));
                }
            }
            match release {
                Some((i, _)) => slots[i] = Slot::Free,
                None => return Ok(d),
            }
            continue;
        }

        // Move along the step until the first blocking bound.
        let mut alpha = 1.0_f64;
        let mut blocking: Option<(usize, Slot)> = None;
        for (k, &i) in free.iter().enumerate() {
            let p = step[k];
            if p < 0.0 {
                let t = (problem.lower[i] - d[i]) / p;
                if t < alpha {
                    alpha = t;
                    blocking = Some((i, Slot::Lower));
                }
            } else if p > 0.0 {
                let t = (problem.upper[i] - d[i]) / p;
                if t < alpha {
                    alpha = t;
                    blocking = Some((i, Slot::Upper));
                }
            }
        }
        let alpha = alpha.max(0.0);
        for (k, &i) in free.iter().enumerate() {
            d[i] += alpha * step[k];
        }
        if let Some((i, slot)) = blocking {
            d[i] = if slot == Slot::Lower {
                problem.lower[i]
            } else {
                problem.upper[i]
            };
            slots[i] = slot;
        }
        debug_assert!(nf > 0);
    }

    Err(QpError::IterationLimit)
}

/// Solve the equality-constrained step on the free variables.
///
/// Returns the step restricted to `free` (same order) and the equality
/// multipliers.
fn solve_kkt(
    problem: &QpProblem<'_>,
    free: &[usize],
    q: &[f64],
    m: usize,
) -> Result<(Vec<f64>, Vec<f64>), QpError> {
    let nf = free.len();
    let size = nf + m;
    if size == 0 {
        return Ok((Vec::new(), Vec::new()));
    }

    let mut k = DMatrix::<f64>::zeros(size, size);
    let mut rhs = DVector::<f64>::zeros(size);
    for (a, &i) in free.iter().enumerate() {
        for (c, &j) in free.iter().enumerate() {
            k[(a, c)] = problem.hessian[(i, j)];
        }
        rhs[a] = -q[i];
    }
    for (r, row) in problem.equalities.iter().enumerate() {
        for (a, &i) in free.iter().enumerate() {
            k[(nf + r, a)] = row[i];
            k[(a, nf + r)] = row[i];
        }
    }

    if nf == 0 {
        // No free variable: multipliers only, fitted to the active gradient.
        let n = q.len();
        let mut et = DMatrix::<f64>::zeros(n, m);
        let mut neg_q = DVector::<f64>::zeros(n);
        for i in 0..n {
            for (r, row) in problem.equalities.iter().enumerate() {
                et[(i, r)] = row[i];
            }
            neg_q[i] = -q[i];
        }
        let lambda = solve_least_squares(&et, &neg_q).ok_or(QpError::Singular)?;
        return Ok((Vec::new(), lambda.iter().copied().collect()));
    }

    let sol = solve_least_squares(&k, &rhs).ok_or(QpError::Singular)?;
    let step = sol.rows(0, nf).iter().copied().collect();
    let lambda = sol.rows(nf, m).iter().copied().collect();
    Ok((step, lambda))
}
