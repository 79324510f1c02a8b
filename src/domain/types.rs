//! Shared domain types.
//!
//! These types are kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON/CSV
//! - rendered by the terminal report

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::FitSettings;
use crate::error::{DataRejection, IngestError};
use crate::fit::validate::{validate_classes, validate_sample};

/// Parametric family shared by every component of one fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DistributionFamily {
    /// Shape `k`, scale `λ`; support `x >= 0`.
    Weibull,
    /// Shape slot holds the mean, scale slot holds the standard deviation.
    Normal,
}

impl DistributionFamily {
    pub const ALL: [DistributionFamily; 2] = [DistributionFamily::Weibull, DistributionFamily::Normal];

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            DistributionFamily::Weibull => "Weibull",
            DistributionFamily::Normal => "Normal",
        }
    }

    /// Names of the `(shape, scale)` slots, for reports.
    pub fn parameter_names(self) -> (&'static str, &'static str) {
        match self {
            DistributionFamily::Weibull => ("shape", "scale"),
            DistributionFamily::Normal => ("mean", "std"),
        }
    }
}

/// Unit convention of a frequency distribution, detected from its sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Normalization {
    /// Sums to 1 (within 0.01).
    Fraction,
    /// Sums to 100 (within 1).
    Percentage,
}

impl Normalization {
    /// Classify a distribution sum, or `None` when it is neither ≈1 nor ≈100.
    pub fn detect(sum: f64) -> Option<Self> {
        if sum > 0.99 && sum < 1.01 {
            Some(Normalization::Fraction)
        } else if sum > 99.0 && sum < 101.0 {
            Some(Normalization::Percentage)
        } else {
            None
        }
    }

    /// Divisor converting values in this unit to fractions.
    pub fn divisor(self) -> f64 {
        match self {
            Normalization::Fraction => 1.0,
            Normalization::Percentage => 100.0,
        }
    }
}

/// One sample's observed distribution.
///
/// Constructed only through [`SampleSeries::new`], which enforces the sample
/// invariants (non-empty name, strictly increasing positive classes, equal
/// lengths, no NaN, sum ≈1 or ≈100).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleSeries {
    name: String,
    classes: Vec<f64>,
    frequencies: Vec<f64>,
    normalization: Normalization,
}

impl SampleSeries {
    pub fn new(
        name: impl Into<String>,
        classes: Vec<f64>,
        frequencies: Vec<f64>,
    ) -> Result<Self, DataRejection> {
        let name = name.into();
        let normalization = validate_sample(Some(&name), Some(&classes), Some(&frequencies))?;
        Ok(Self {
            name,
            classes,
            frequencies,
            normalization,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    pub fn normalization(&self) -> Normalization {
        self.normalization
    }
}

/// One raw sample row of a dataset file.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    pub name: String,
    pub distribution: Vec<f64>,
}

/// A set of samples sharing one class layout, as loaded from a file.
#[derive(Debug, Clone, PartialEq)]
pub struct GrainSizeDataset {
    pub classes: Vec<f64>,
    pub samples: Vec<SampleRecord>,
    /// Unit shared by every sample (set by validation).
    pub normalization: Normalization,
}

impl GrainSizeDataset {
    pub fn sample_names(&self) -> impl Iterator<Item = &str> {
        self.samples.iter().map(|s| s.name.as_str())
    }

    /// Check the class layout and every sample; all samples must share one unit.
    pub fn validate(&self) -> Result<Normalization, IngestError> {
        validate_classes(&self.classes).map_err(IngestError::Dataset)?;
        let mut shared: Option<Normalization> = None;
        for sample in &self.samples {
            let unit = validate_sample(Some(&sample.name), Some(&self.classes), Some(&sample.distribution))
                .map_err(|reason| IngestError::Rejected {
                    sample: sample.name.clone(),
                    reason,
                })?;
            match shared {
                None => shared = Some(unit),
                Some(first) if first != unit => {
                    return Err(IngestError::Dataset(DataRejection::InconsistentNormalization {
                        sample: sample.name.clone(),
                    }));
                }
                Some(_) => {}
            }
        }
        shared.ok_or(IngestError::Layout {
            line: 2,
            message: "no sample rows".to_string(),
        })
    }

    /// Build the typed series for one sample by name.
    pub fn series(&self, name: &str) -> Option<Result<SampleSeries, DataRejection>> {
        self.samples
            .iter()
            .find(|s| s.name == name)
            .map(|s| SampleSeries::new(s.name.clone(), self.classes.clone(), s.distribution.clone()))
    }
}

/// An `(x, y)` pair of equal-length series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

/// Which acceptable solver outcome ended an optimization stage.
///
/// `AcceptableLimit` means the iteration budget ran out with every
/// constraint satisfied; it is reported as success but with lower
/// confidence than `Converged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    Converged,
    AcceptableLimit,
}

/// Summary statistics of one fitted component.
///
/// `mean`, `median` and `mode` are in physical class units. Variance,
/// standard deviation, skewness and (excess) kurtosis are in fitting-space
/// (class index) units. Undefined values are `NaN` and serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentStatistics {
    /// 1-based component label (`C1`, `C2`, ...), ordered by location.
    pub index: usize,
    pub shape: f64,
    pub scale: f64,
    pub weight: f64,
    pub mean: f64,
    pub median: f64,
    pub mode: f64,
    pub variance: f64,
    pub standard_deviation: f64,
    pub skewness: f64,
    pub kurtosis: f64,
}

/// Result of one successful fit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitReport {
    pub sample_name: String,
    pub distribution_family: DistributionFamily,
    pub component_count: usize,
    /// Unit of the fed data; every series below is in fractions.
    pub normalization: Normalization,
    /// The trimmed observation that was fit, in physical x.
    pub target: Series,
    pub fitted_sum: Series,
    pub components: Vec<Series>,
    pub mse: f64,
    /// Fitting-space position 1 corresponds to class index `x_offset - 1`.
    pub x_offset: usize,
    /// Final parameter vector `[shape, scale, weight]*`, in component order.
    pub parameters: Vec<f64>,
    pub global_outcome: StageOutcome,
    pub final_outcome: StageOutcome,
    pub global_hops: usize,
    pub final_iterations: usize,
    pub statistics: Vec<ComponentStatistics>,
}

impl FitReport {
    pub fn weights(&self) -> Vec<f64> {
        self.statistics.iter().map(|s| s.weight).collect()
    }

    pub fn weight_sum(&self) -> f64 {
        self.statistics.iter().map(|s| s.weight).sum()
    }
}

/// A saved report file (JSON).
#[derive(Debug, Clone, Serialize)]
pub struct ReportFile {
    pub tool: String,
    pub version: String,
    pub generated_at: DateTime<Utc>,
    pub settings: FitSettings,
    pub reports: Vec<FitReport>,
}
