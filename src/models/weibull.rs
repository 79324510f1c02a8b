//! Weibull component: density, parameter gradient and closed-form moments.
//!
//! With `t = x/λ`:
//!
//! - `f(x; k, λ) = (k/λ) t^(k-1) exp(-t^k)` on `x >= 0`
//! - `∂ ln f/∂k = 1/k + ln t · (1 - t^k)`
//! - `∂ ln f/∂λ = (k/λ)(t^k - 1)`
//!
//! The density is evaluated in log space so that large `t^k` underflows to
//! a clean zero rather than `inf · 0 = NaN`.

use statrs::function::gamma::gamma;

use crate::models::ComponentMoments;

/// Density at `x`. Returns `NaN` for non-positive parameters.
pub fn pdf(x: f64, shape: f64, scale: f64) -> f64 {
    if !(shape > 0.0 && scale > 0.0) {
        return f64::NAN;
    }
    if x < 0.0 {
        return 0.0;
    }
    if x == 0.0 {
        return if shape < 1.0 {
            f64::INFINITY
        } else if shape > 1.0 {
            0.0
        } else {
            1.0 / scale
        };
    }
    let t = x / scale;
    let ln_t = t.ln();
    let log_f = shape.ln() - scale.ln() + (shape - 1.0) * ln_t - t.powf(shape);
    log_f.exp()
}

/// `(∂f/∂shape, ∂f/∂scale)` at `x`.
pub fn pdf_gradient(x: f64, shape: f64, scale: f64) -> (f64, f64) {
    let f = pdf(x, shape, scale);
    if !(f.is_finite() && f > 0.0) || x <= 0.0 {
        return (0.0, 0.0);
    }
    let t = x / scale;
    let ln_t = t.ln();
    let tk = t.powf(shape);
    let d_shape = 1.0 / shape + ln_t * (1.0 - tk);
    let d_scale = (shape / scale) * (tk - 1.0);
    (f * d_shape, f * d_scale)
}

/// Closed-form moments. Non-finite results become `NaN`.
pub fn moments(shape: f64, scale: f64) -> ComponentMoments {
    if !(shape > 0.0 && scale > 0.0) {
        return ComponentMoments::undefined();
    }
    let g = |i: f64| gamma(1.0 + i / shape);
    let (g1, g2, g3, g4) = (g(1.0), g(2.0), g(3.0), g(4.0));

    let spread = g2 - g1 * g1;
    let variance = scale * scale * spread;
    let skewness = (g3 - 3.0 * g1 * g2 + 2.0 * g1.powi(3)) / spread.powf(1.5);
    let kurtosis =
        (g4 - 4.0 * g1 * g3 + 6.0 * g1 * g1 * g2 - 3.0 * g1.powi(4)) / (spread * spread) - 3.0;
    let mode = if shape > 1.0 {
        scale * ((shape - 1.0) / shape).powf(1.0 / shape)
    } else {
        f64::NAN
    };

    ComponentMoments {
        mean: scale * g1,
        median: scale * std::f64::consts::LN_2.powf(1.0 / shape),
        mode,
        variance,
        standard_deviation: variance.sqrt(),
        skewness,
        kurtosis,
    }
    .sanitized()
}

/// Scale that puts the mode at `mode` for the given shape (`shape > 1`).
pub fn scale_for_mode(mode: f64, shape: f64) -> f64 {
    mode / ((shape - 1.0) / shape).powf(1.0 / shape)
}
