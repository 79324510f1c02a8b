//! Objective functions for the optimizers.

use crate::models::{MixtureModel, PARAMS_PER_COMPONENT};

/// Constant factor applied to the residual sum of squares.
///
/// Only the meaning of the objective tolerances depends on it; the location
/// of the optimum does not.
pub const OBJECTIVE_SCALE: f64 = 100.0;

/// A scalar objective with a gradient.
pub trait Objective {
    fn value(&self, params: &[f64]) -> f64;

    /// Gradient at `params` (central differences unless overridden).
    fn gradient(&self, params: &[f64]) -> Vec<f64> {
        let mut grad = vec![0.0; params.len()];
        let mut probe = params.to_vec();
        for i in 0..params.len() {
            let eps = 1e-7 * params[i].abs().max(1.0);
            probe[i] = params[i] + eps;
            let f_plus = self.value(&probe);
            probe[i] = params[i] - eps;
            let f_minus = self.value(&probe);
            probe[i] = params[i];
            grad[i] = (f_plus - f_minus) / (2.0 * eps);
        }
        grad
    }
}

/// Scaled squared residuals of a mixture against one fitting window.
#[derive(Debug, Clone, Copy)]
pub struct MixtureObjective<'a> {
    model: &'a MixtureModel,
    x: &'a [f64],
    y: &'a [f64],
}

impl<'a> MixtureObjective<'a> {
    /// # Panics
    /// Panics if `x` and `y` differ in length.
    pub fn new(model: &'a MixtureModel, x: &'a [f64], y: &'a [f64]) -> Self {
        assert_eq!(x.len(), y.len(), "fitting window length");
        Self { model, x, y }
    }
}

impl Objective for MixtureObjective<'_> {
    fn value(&self, params: &[f64]) -> f64 {
        let sse: f64 = self
            .x
            .iter()
            .zip(self.y.iter())
            .map(|(&x, &y)| {
                let r = self.model.mixed_density(x, params) - y;
                r * r
            })
            .sum();
        OBJECTIVE_SCALE * sse
    }

    fn gradient(&self, params: &[f64]) -> Vec<f64> {
        let mut grad = vec![0.0; params.len()];
        let mut densities = vec![0.0; self.model.component_count()];
        for (&x, &y) in self.x.iter().zip(self.y.iter()) {
            let mut mixed = 0.0;
            for (k, c) in params.chunks_exact(PARAMS_PER_COMPONENT).enumerate() {
                densities[k] = self.model.single_density(x, c[0], c[1]);
                mixed += c[2] * densities[k];
            }
            let two_r = 2.0 * OBJECTIVE_SCALE * (mixed - y);
            for (k, c) in params.chunks_exact(PARAMS_PER_COMPONENT).enumerate() {
                let (d_shape, d_scale) = self.model.single_density_gradient(x, c[0], c[1]);
                let base = k * PARAMS_PER_COMPONENT;
                grad[base] += two_r * c[2] * d_shape;
                grad[base + 1] += two_r * c[2] * d_scale;
                grad[base + 2] += two_r * densities[k];
            }
        }
        grad
    }
}
