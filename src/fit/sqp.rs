//! Sequential quadratic programming for box bounds plus linear equalities.
//!
//! This is the local solver used by both fitting stages. It follows the
//! SLSQP recipe (quasi-Newton Hessian, QP subproblem per iteration, line
//! search) specialised to linear constraints:
//!
//! - the start point is projected onto the feasible set once, after which
//!   every QP step keeps `E d = 0` and stays inside the box, so all iterates
//!   are feasible and the line search only needs the objective;
//! - the Hessian approximation starts at the identity and is updated with
//!   Powell-damped BFGS, which keeps it positive definite;
//! - a failed line search resets the Hessian to the identity once before
//!   giving up.
//!
//! Termination mirrors the solver statuses the fitting policy cares about:
//! `Converged` and `IterationLimit` (budget exhausted, constraints satisfied)
//! are both acceptable, everything else is a failure.

use std::ops::ControlFlow;

use nalgebra::{DMatrix, DVector};
use serde::Serialize;

use crate::fit::objective::Objective;
use crate::math::{QpProblem, solve_box_eq_qp};
use crate::models::LinearConstraint;

/// Armijo sufficient-decrease constant.
const ARMIJO: f64 = 1e-4;
/// Backtracking halvings before a line search gives up.
const MAX_BACKTRACK: usize = 40;
/// Relative step length treated as a stationary point.
const STEP_EPS: f64 = 1e-14;
/// Directional derivative small enough to call a failed line search converged.
const SLOPE_EPS: f64 = 1e-10;
/// Maximum constraint residual for a result to count as feasible.
pub const FEASIBILITY_TOL: f64 = 1e-8;

/// How a local solve ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Objective change below tolerance, or a stationary point.
    Converged,
    /// Iteration budget exhausted.
    IterationLimit,
    /// No sufficient decrease along a descent direction.
    LineSearchFailed,
    /// The QP subproblem could not be solved.
    QpFailed,
    /// The objective or its gradient became non-finite.
    NonFinite,
    /// Stopped by the iteration callback.
    Interrupted,
}

impl Termination {
    /// `Converged` or `IterationLimit`.
    pub fn is_acceptable(self) -> bool {
        matches!(self, Termination::Converged | Termination::IterationLimit)
    }
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Termination::Converged => "optimization terminated successfully",
            Termination::IterationLimit => "iteration limit reached",
            Termination::LineSearchFailed => "line search failed to decrease the objective",
            Termination::QpFailed => "QP subproblem could not be solved",
            Termination::NonFinite => "objective became non-finite",
            Termination::Interrupted => "interrupted by callback",
        };
        f.write_str(text)
    }
}

/// Outcome of one local solve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizeResult {
    pub x: Vec<f64>,
    pub fun: f64,
    pub iterations: usize,
    pub evaluations: usize,
    pub termination: Termination,
    /// Largest absolute equality residual at `x`.
    pub constraint_violation: f64,
}

impl OptimizeResult {
    /// Acceptable termination with every constraint satisfied.
    pub fn is_acceptable(&self) -> bool {
        self.termination.is_acceptable()
            && self.fun.is_finite()
            && self.constraint_violation <= FEASIBILITY_TOL
    }

    /// Placeholder for a solve that was stopped before it started.
    pub fn interrupted(x: &[f64]) -> Self {
        Self {
            x: x.to_vec(),
            fun: f64::NAN,
            iterations: 0,
            evaluations: 0,
            termination: Termination::Interrupted,
            constraint_violation: f64::NAN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SqpOptions {
    /// Absolute tolerance on the objective change between iterations.
    pub tolerance: f64,
    pub max_iterations: usize,
}

/// Local minimizer bound to one feasible set.
#[derive(Debug, Clone, Copy)]
pub struct SqpMinimizer<'a> {
    bounds: &'a [(f64, f64)],
    constraints: &'a [LinearConstraint],
    options: SqpOptions,
}

impl<'a> SqpMinimizer<'a> {
    pub fn new(
        bounds: &'a [(f64, f64)],
        constraints: &'a [LinearConstraint],
        options: SqpOptions,
    ) -> Self {
        Self {
            bounds,
            constraints,
            options,
        }
    }

    /// Minimize `objective` from `x0`.
    ///
    /// `callback(iteration, x, f)` runs after every accepted iteration;
    /// returning `ControlFlow::Break` stops the solve with
    /// `Termination::Interrupted`.
    pub fn minimize<F>(&self, objective: &dyn Objective, x0: &[f64], mut callback: F) -> OptimizeResult
    where
        F: FnMut(usize, &[f64], f64) -> ControlFlow<()>,
    {
        let n = x0.len();
        let mut x = project_feasible(x0, self.bounds, self.constraints);
        let mut f = objective.value(&x);
        let mut evaluations = 1;

        let finish = |x: Vec<f64>, fun: f64, iterations: usize, evaluations: usize, termination| {
            let constraint_violation = max_violation(&x, self.constraints);
            OptimizeResult {
                x,
                fun,
                iterations,
                evaluations,
                termination,
                constraint_violation,
            }
        };

        if !f.is_finite() {
            return finish(x, f, 0, evaluations, Termination::NonFinite);
        }
        let mut g = objective.gradient(&x);
        if g.iter().any(|v| !v.is_finite()) {
            return finish(x, f, 0, evaluations, Termination::NonFinite);
        }
        if f == 0.0 {
            return finish(x, f, 0, evaluations, Termination::Converged);
        }

        let equalities: Vec<Vec<f64>> = self.constraints.iter().map(|c| c.coefficients.clone()).collect();
        let mut hessian = DMatrix::<f64>::identity(n, n);
        let mut hessian_is_identity = true;

        for iteration in 1..=self.options.max_iterations {
            // Step bounds relative to x; clamp so a rounding overshoot never
            // makes d = 0 infeasible.
            let lower: Vec<f64> = x.iter().zip(self.bounds).map(|(v, b)| (b.0 - v).min(0.0)).collect();
            let upper: Vec<f64> = x.iter().zip(self.bounds).map(|(v, b)| (b.1 - v).max(0.0)).collect();
            let problem = QpProblem {
                hessian: &hessian,
                gradient: &g,
                equalities: &equalities,
                lower: &lower,
                upper: &upper,
            };
            let d = match solve_box_eq_qp(&problem, &vec![0.0; n]) {
                Ok(d) => d,
                Err(_) if !hessian_is_identity => {
                    hessian = DMatrix::identity(n, n);
                    hessian_is_identity = true;
                    continue;
                }
                Err(_) => return finish(x, f, iteration, evaluations, Termination::QpFailed),
            };

            let x_norm = inf_norm(&x);
            if inf_norm(&d) <= STEP_EPS * (1.0 + x_norm) {
                return finish(x, f, iteration, evaluations, Termination::Converged);
            }

            let slope: f64 = g.iter().zip(d.iter()).map(|(a, b)| a * b).sum();
            let accepted = if slope < 0.0 {
                self.line_search(objective, &x, &d, f, slope, &mut evaluations)
            } else {
                None
            };

            let Some((x_new, f_new)) = accepted else {
                if !hessian_is_identity {
                    hessian = DMatrix::identity(n, n);
                    hessian_is_identity = true;
                    continue;
                }
                let termination = if slope.abs() <= SLOPE_EPS * (1.0 + f.abs()) {
                    Termination::Converged
                } else {
                    Termination::LineSearchFailed
                };
                return finish(x, f, iteration, evaluations, termination);
            };

            let g_new = objective.gradient(&x_new);
            if g_new.iter().any(|v| !v.is_finite()) {
                return finish(x_new, f_new, iteration, evaluations, Termination::NonFinite);
            }

            let s = DVector::from_iterator(n, x_new.iter().zip(x.iter()).map(|(a, b)| a - b));
            let y = DVector::from_iterator(n, g_new.iter().zip(g.iter()).map(|(a, b)| a - b));
            if damped_bfgs_update(&mut hessian, &s, &y) {
                hessian_is_identity = false;
            }

            let delta_f = (f - f_new).abs();
            x = x_new;
            f = f_new;
            g = g_new;

            if callback(iteration, &x, f).is_break() {
                return finish(x, f, iteration, evaluations, Termination::Interrupted);
            }
            if delta_f < self.options.tolerance || f == 0.0 {
                return finish(x, f, iteration, evaluations, Termination::Converged);
            }
        }

        finish(x, f, self.options.max_iterations, evaluations, Termination::IterationLimit)
    }

    /// Armijo backtracking along `d`. Returns the accepted point and value.
    fn line_search(
        &self,
        objective: &dyn Objective,
        x: &[f64],
        d: &[f64],
        f: f64,
        slope: f64,
        evaluations: &mut usize,
    ) -> Option<(Vec<f64>, f64)> {
        let mut alpha = 1.0;
        for _ in 0..MAX_BACKTRACK {
            let trial: Vec<f64> = x
                .iter()
                .zip(d.iter())
                .zip(self.bounds)
                .map(|((v, dv), b)| (v + alpha * dv).clamp(b.0, b.1))
                .collect();
            let f_trial = objective.value(&trial);
            *evaluations += 1;
            if f_trial.is_finite() && f_trial <= f + ARMIJO * alpha * slope {
                return Some((trial, f_trial));
            }
            alpha *= 0.5;
        }
        None
    }
}

/// Powell-damped BFGS update of `b`. Returns `false` when skipped.
fn damped_bfgs_update(b: &mut DMatrix<f64>, s: &DVector<f64>, y: &DVector<f64>) -> bool {
    let bs = &*b * s;
    let s_bs = s.dot(&bs);
    if !(s_bs.is_finite() && s_bs > f64::MIN_POSITIVE) {
        return false;
    }
    let s_y = s.dot(y);
    let theta = if s_y >= 0.2 * s_bs {
        1.0
    } else {
        0.8 * s_bs / (s_bs - s_y)
    };
    let r = y * theta + &bs * (1.0 - theta);
    let s_r = s.dot(&r);
    if !(s_r.is_finite() && s_r > f64::MIN_POSITIVE) {
        return false;
    }
    let updated = &*b - (&bs * bs.transpose()) / s_bs + (&r * r.transpose()) / s_r;
    if updated.iter().any(|v| !v.is_finite()) {
        return false;
    }
    *b = updated;
    true
}

/// Project `x` onto `{x : lo ≤ x ≤ hi, c·x = rhs for every constraint}`.
///
/// Each equality is enforced by bisection on its multiplier `ν` in
/// `x_i(ν) = clamp(z_i - ν a_i)`; constraints are swept cyclically until the
/// residuals settle. For constraints on disjoint variables (the mixture case)
/// one sweep is exact.
pub fn project_feasible(
    x: &[f64],
    bounds: &[(f64, f64)],
    constraints: &[LinearConstraint],
) -> Vec<f64> {
    let mut z: Vec<f64> = x
        .iter()
        .zip(bounds)
        .map(|(v, b)| if v.is_finite() { v.clamp(b.0, b.1) } else { b.0 })
        .collect();

    for _ in 0..50 {
        for c in constraints {
            project_onto(&mut z, bounds, c);
        }
        if max_violation(&z, constraints) <= 1e-14 {
            break;
        }
    }
    z
}

fn project_onto(z: &mut [f64], bounds: &[(f64, f64)], c: &LinearConstraint) {
    if c.residual(z).abs() <= 1e-15 {
        return;
    }
    let base = z.to_vec();
    let at = |nu: f64| -> f64 {
        base.iter()
            .zip(bounds)
            .zip(c.coefficients.iter())
            .map(|((v, b), a)| {
                if *a == 0.0 {
                    a * v
                } else {
                    a * (v - nu * a).clamp(b.0, b.1)
                }
            })
            .sum::<f64>()
    };

    // h(ν) = c·x(ν) is non-increasing; bracket the root.
    let mut lo = -1.0;
    let mut hi = 1.0;
    for _ in 0..200 {
        if at(lo) >= c.rhs {
            break;
        }
        lo *= 2.0;
    }
    for _ in 0..200 {
        if at(hi) <= c.rhs {
            break;
        }
        hi *= 2.0;
    }
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        let h = at(mid);
        if (h - c.rhs).abs() <= 1e-16 || (hi - lo).abs() <= f64::EPSILON * (1.0 + mid.abs()) {
            lo = mid;
            hi = mid;
            break;
        }
        if h > c.rhs {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    let nu = 0.5 * (lo + hi);
    for ((v, b), a) in z.iter_mut().zip(bounds).zip(c.coefficients.iter()) {
        if *a != 0.0 {
            *v = (*v - nu * a).clamp(b.0, b.1);
        }
    }
}

fn max_violation(x: &[f64], constraints: &[LinearConstraint]) -> f64 {
    constraints
        .iter()
        .map(|c| c.residual(x).abs())
        .fold(0.0, f64::max)
}

fn inf_norm(v: &[f64]) -> f64 {
    v.iter().fold(0.0_f64, |acc, x| acc.max(x.abs()))
}
