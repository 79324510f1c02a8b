//! Input checks run before a sample is accepted.
//!
//! Checks run in a fixed order and the first failure wins, so callers always
//! see the most basic problem first.

use crate::domain::Normalization;
use crate::error::DataRejection;

/// Presence, length and NaN checks.
pub fn validate_data(
    name: Option<&str>,
    classes: Option<&[f64]>,
    frequencies: Option<&[f64]>,
) -> Result<(), DataRejection> {
    let name = name.ok_or(DataRejection::NameNone)?;
    if name.is_empty() {
        return Err(DataRejection::NameEmpty);
    }
    let x = classes.ok_or(DataRejection::XNone)?;
    let y = frequencies.ok_or(DataRejection::YNone)?;
    if x.len() != y.len() {
        return Err(DataRejection::LengthNotEqual {
            x_len: x.len(),
            y_len: y.len(),
        });
    }
    if x.iter().any(|v| v.is_nan()) {
        return Err(DataRejection::XHasNan);
    }
    if y.iter().any(|v| v.is_nan()) {
        return Err(DataRejection::YHasNan);
    }
    Ok(())
}

/// Classes must be non-empty, strictly increasing, positive and finite.
pub fn validate_classes(classes: &[f64]) -> Result<(), DataRejection> {
    if classes.is_empty() {
        return Err(DataRejection::NoClasses);
    }
    if let Some(i) = classes.windows(2).position(|w| !(w[1] > w[0])) {
        return Err(DataRejection::ClassesNotIncreasing { index: i + 1 });
    }
    if let Some(index) = classes.iter().position(|v| !(v.is_finite() && *v > 0.0)) {
        return Err(DataRejection::NonPositiveClass { index });
    }
    Ok(())
}

/// Frequencies must be finite, non-negative and sum to ≈1 or ≈100.
pub fn validate_frequencies(frequencies: &[f64]) -> Result<Normalization, DataRejection> {
    if let Some(index) = frequencies.iter().position(|v| !(v.is_finite() && *v >= 0.0)) {
        return Err(DataRejection::NegativeFrequency { index });
    }
    let sum: f64 = frequencies.iter().sum();
    Normalization::detect(sum).ok_or(DataRejection::SumNotNormalized { sum })
}

/// Every per-sample check, in order. Returns the detected unit.
pub fn validate_sample(
    name: Option<&str>,
    classes: Option<&[f64]>,
    frequencies: Option<&[f64]>,
) -> Result<Normalization, DataRejection> {
    validate_data(name, classes, frequencies)?;
    match (classes, frequencies) {
        (Some(x), Some(y)) => {
            validate_classes(x)?;
            validate_frequencies(y)
        }
        (None, _) => Err(DataRejection::XNone),
        (_, None) => Err(DataRejection::YNone),
    }
}
