//! Mixture of `n` components of one distribution family.
//!
//! The optimizer manipulates a flat parameter vector
//! `[shape_0, scale_0, weight_0, shape_1, scale_1, weight_1, ...]`. Family
//! specifics (density, gradient, moments, bounds, seeds) dispatch on
//! `DistributionFamily`; the mixture itself only knows about weighted sums.

use crate::domain::DistributionFamily;
use crate::error::SettingError;
use crate::models::{normal, weibull};

/// Number of entries each component occupies in the parameter vector.
pub const PARAMS_PER_COMPONENT: usize = 3;

/// Bounds applied to every component weight.
pub const WEIGHT_BOUNDS: (f64, f64) = (0.0, 1.0);

/// Shape used for every Weibull seed component.
const WEIBULL_SEED_SHAPE: f64 = 3.0;

/// One component's parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComponentParameters {
    pub shape: f64,
    pub scale: f64,
    pub weight: f64,
}

/// Closed-form summary of one component, in fitting-space units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComponentMoments {
    pub mean: f64,
    pub median: f64,
    pub mode: f64,
    pub variance: f64,
    pub standard_deviation: f64,
    pub skewness: f64,
    pub kurtosis: f64,
}

impl ComponentMoments {
    pub fn undefined() -> Self {
        Self {
            mean: f64::NAN,
            median: f64::NAN,
            mode: f64::NAN,
            variance: f64::NAN,
            standard_deviation: f64::NAN,
            skewness: f64::NAN,
            kurtosis: f64::NAN,
        }
    }

    /// Replace every non-finite value with `NaN`.
    pub fn sanitized(self) -> Self {
        let s = |v: f64| if v.is_finite() { v } else { f64::NAN };
        Self {
            mean: s(self.mean),
            median: s(self.median),
            mode: s(self.mode),
            variance: s(self.variance),
            standard_deviation: s(self.standard_deviation),
            skewness: s(self.skewness),
            kurtosis: s(self.kurtosis),
        }
    }
}

/// Linear equality `coefficients · x == rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint {
    pub coefficients: Vec<f64>,
    pub rhs: f64,
}

impl LinearConstraint {
    /// `coefficients · x - rhs`.
    pub fn residual(&self, x: &[f64]) -> f64 {
        self.coefficients
            .iter()
            .zip(x.iter())
            .map(|(a, v)| a * v)
            .sum::<f64>()
            - self.rhs
    }
}

impl DistributionFamily {
    pub fn density(self, x: f64, shape: f64, scale: f64) -> f64 {
        match self {
            DistributionFamily::Weibull => weibull::pdf(x, shape, scale),
            DistributionFamily::Normal => normal::pdf(x, shape, scale),
        }
    }

    pub fn density_gradient(self, x: f64, shape: f64, scale: f64) -> (f64, f64) {
        match self {
            DistributionFamily::Weibull => weibull::pdf_gradient(x, shape, scale),
            DistributionFamily::Normal => normal::pdf_gradient(x, shape, scale),
        }
    }

    pub fn moments(self, shape: f64, scale: f64) -> ComponentMoments {
        match self {
            DistributionFamily::Weibull => weibull::moments(shape, scale),
            DistributionFamily::Normal => normal::moments(shape, scale),
        }
    }

    /// `(shape bounds, scale bounds)` in fitting space.
    pub fn parameter_bounds(self) -> ((f64, f64), (f64, f64)) {
        match self {
            DistributionFamily::Weibull => ((0.5, 100.0), (0.5, 1000.0)),
            DistributionFamily::Normal => ((0.0, 1000.0), (0.1, 500.0)),
        }
    }

    /// Seed `(shape, scale)` for a component centred at `centre`.
    fn seed_component(self, centre: f64, component_count: usize, span: f64) -> (f64, f64) {
        match self {
            DistributionFamily::Weibull => (
                WEIBULL_SEED_SHAPE,
                weibull::scale_for_mode(centre, WEIBULL_SEED_SHAPE),
            ),
            DistributionFamily::Normal => (centre, span / (2.0 * (component_count as f64 + 1.0))),
        }
    }
}

/// Pure mathematical definition of a mixture for a fixed `(family, count)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MixtureModel {
    family: DistributionFamily,
    component_count: usize,
}

impl MixtureModel {
    pub fn new(family: DistributionFamily, component_count: usize) -> Result<Self, SettingError> {
        if component_count < 1 {
            return Err(SettingError::InvalidComponentCount(component_count));
        }
        Ok(Self {
            family,
            component_count,
        })
    }

    pub fn family(&self) -> DistributionFamily {
        self.family
    }

    pub fn component_count(&self) -> usize {
        self.component_count
    }

    /// Length of the parameter vector.
    pub fn param_len(&self) -> usize {
        PARAMS_PER_COMPONENT * self.component_count
    }

    pub fn single_density(&self, x: f64, shape: f64, scale: f64) -> f64 {
        self.family.density(x, shape, scale)
    }

    pub fn single_density_gradient(&self, x: f64, shape: f64, scale: f64) -> (f64, f64) {
        self.family.density_gradient(x, shape, scale)
    }

    /// `Σ weight_i · f(x; shape_i, scale_i)`.
    ///
    /// # Panics
    /// Panics if `params.len() != self.param_len()`.
    pub fn mixed_density(&self, x: f64, params: &[f64]) -> f64 {
        assert_eq!(params.len(), self.param_len(), "parameter vector length");
        params
            .chunks_exact(PARAMS_PER_COMPONENT)
            .map(|c| c[2] * self.family.density(x, c[0], c[1]))
            .sum()
    }

    /// Deterministic seed for a fitting window of `span` classes.
    ///
    /// Components are centred at `span·(i+1)/(n+1)` with equal weights.
    pub fn default_parameters(&self, span: f64) -> Vec<f64> {
        let n = self.component_count;
        let ((shape_lo, shape_hi), (scale_lo, scale_hi)) = self.family.parameter_bounds();
        let mut out = Vec::with_capacity(self.param_len());
        for i in 0..n {
            let centre = span * (i as f64 + 1.0) / (n as f64 + 1.0);
            let (shape, scale) = self.family.seed_component(centre, n, span);
            out.push(shape.clamp(shape_lo, shape_hi));
            out.push(scale.clamp(scale_lo, scale_hi));
            out.push(1.0 / n as f64);
        }
        out
    }

    /// Per-parameter `(min, max)`, aligned with the parameter vector.
    pub fn bounds(&self) -> Vec<(f64, f64)> {
        let (shape, scale) = self.family.parameter_bounds();
        (0..self.component_count)
            .flat_map(|_| [shape, scale, WEIGHT_BOUNDS])
            .collect()
    }

    /// Equality constraints: the weights sum to one.
    pub fn constraints(&self) -> Vec<LinearConstraint> {
        let coefficients = (0..self.param_len())
            .map(|i| if i % PARAMS_PER_COMPONENT == 2 { 1.0 } else { 0.0 })
            .collect();
        vec![LinearConstraint {
            coefficients,
            rhs: 1.0,
        }]
    }

    /// Split a parameter vector into components.
    pub fn unpack(&self, params: &[f64]) -> Vec<ComponentParameters> {
        params
            .chunks_exact(PARAMS_PER_COMPONENT)
            .map(|c| ComponentParameters {
                shape: c[0],
                scale: c[1],
                weight: c[2],
            })
            .collect()
    }

    /// Closed-form statistics of one component (fitting space).
    pub fn statistics(&self, shape: f64, scale: f64) -> ComponentMoments {
        self.family.moments(shape, scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rejects_zero_components() {
        assert_eq!(
            MixtureModel::new(DistributionFamily::Weibull, 0),
            Err(SettingError::InvalidComponentCount(0))
        );
    }

    #[test]
    fn mixed_density_is_weighted_sum() {
        let model = MixtureModel::new(DistributionFamily::Normal, 2).unwrap();
        let params = [3.0, 1.0, 0.25, 7.0, 2.0, 0.75];
        let x = 4.0;
        let expected = 0.25 * normal::pdf(x, 3.0, 1.0) + 0.75 * normal::pdf(x, 7.0, 2.0);
        assert_relative_eq!(model.mixed_density(x, &params), expected, epsilon = 1e-15);
    }

    #[test]
    fn defaults_are_reproducible_and_feasible() {
        for family in DistributionFamily::ALL {
            for n in 1..=4 {
                let model = MixtureModel::new(family, n).unwrap();
                let a = model.default_parameters(40.0);
                let b = model.default_parameters(40.0);
                assert_eq!(a, b);
                assert_eq!(a.len(), model.param_len());

                for (v, (lo, hi)) in a.iter().zip(model.bounds()) {
                    assert!(*v >= lo && *v <= hi, "{family:?} n={n}: {v} outside [{lo}, {hi}]");
                }
                for c in model.constraints() {
                    assert!(c.residual(&a).abs() < 1e-12);
                }
            }
        }
    }

    #[test]
    fn weibull_defaults_spread_modes_evenly() {
        let model = MixtureModel::new(DistributionFamily::Weibull, 3).unwrap();
        let params = model.default_parameters(40.0);
        let modes: Vec<f64> = model
            .unpack(&params)
            .iter()
            .map(|c| model.statistics(c.shape, c.scale).mode)
            .collect();
        assert_relative_eq!(modes[0], 10.0, epsilon = 1e-9);
        assert_relative_eq!(modes[1], 20.0, epsilon = 1e-9);
        assert_relative_eq!(modes[2], 30.0, epsilon = 1e-9);
    }

    #[test]
    fn constraint_selects_weights_only() {
        let model = MixtureModel::new(DistributionFamily::Weibull, 2).unwrap();
        let c = &model.constraints()[0];
        assert_eq!(c.coefficients, vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0]);
        assert_eq!(c.rhs, 1.0);
    }
}
