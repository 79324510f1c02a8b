//! Normal component (mean in the shape slot, standard deviation in the scale slot).

use crate::models::ComponentMoments;

const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;

pub fn pdf(x: f64, mean: f64, std: f64) -> f64 {
    if !(std > 0.0) {
        return f64::NAN;
    }
    let z = (x - mean) / std;
    INV_SQRT_2PI / std * (-0.5 * z * z).exp()
}

/// `(∂f/∂mean, ∂f/∂std)` at `x`.
pub fn pdf_gradient(x: f64, mean: f64, std: f64) -> (f64, f64) {
    let f = pdf(x, mean, std);
    if !(f.is_finite() && f > 0.0) {
        return (0.0, 0.0);
    }
    let z = (x - mean) / std;
    (f * z / std, f * (z * z - 1.0) / std)
}

pub fn moments(mean: f64, std: f64) -> ComponentMoments {
    if !(std > 0.0) {
        return ComponentMoments::undefined();
    }
    ComponentMoments {
        mean,
        median: mean,
        mode: mean,
        variance: std * std,
        standard_deviation: std,
        skewness: 0.0,
        kurtosis: 0.0,
    }
    .sanitized()
}
