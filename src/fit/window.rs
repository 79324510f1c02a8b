//! The informative slice of a distribution that is actually fitted.

use serde::Serialize;

use crate::error::DataRejection;

/// Minimum number of classes a window must keep.
pub const MIN_WINDOW_LEN: usize = 2;

/// Trimmed series with its fitting-space abscissa.
///
/// `fit_x` is `1, 2, ..., len`; position `j` in fitting space corresponds to
/// class `start_index + j - 1`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FittingWindow {
    pub start_index: usize,
    /// Exclusive.
    pub end_index: usize,
    pub real_x: Vec<f64>,
    pub fit_x: Vec<f64>,
    pub fit_y: Vec<f64>,
}

impl FittingWindow {
    /// Trim `fractions` and build the window over `classes`.
    pub fn from_series(classes: &[f64], fractions: &[f64]) -> Result<Self, DataRejection> {
        let (start_index, end_index) = valid_data_range(fractions);
        let len = end_index - start_index;
        if len < MIN_WINDOW_LEN {
            return Err(DataRejection::InsufficientSupport { len });
        }
        Ok(Self {
            start_index,
            end_index,
            real_x: classes[start_index..end_index].to_vec(),
            fit_x: (1..=len).map(|j| j as f64).collect(),
            fit_y: fractions[start_index..end_index].to_vec(),
        })
    }

    pub fn len(&self) -> usize {
        self.end_index - self.start_index
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `start_index + 1`, the 1-based class number at fitting-space `x = 1`.
    pub fn x_offset(&self) -> usize {
        self.start_index + 1
    }
}

/// `[start, end)` keeping at most one zero on either side of the positive run.
///
/// An all-zero series keeps its full length.
pub fn valid_data_range(y: &[f64]) -> (usize, usize) {
    let n = y.len();
    let Some(first) = y.iter().position(|v| *v > 0.0) else {
        return (0, n);
    };
    let last = y.iter().rposition(|v| *v > 0.0).unwrap_or(first);
    let start = first.saturating_sub(1);
    let trailing_zeros = n - 1 - last;
    let end = if trailing_zeros <= 1 { n } else { last + 2 };
    (start, end)
}
