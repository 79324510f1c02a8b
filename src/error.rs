//! Error taxonomy.
//!
//! The library reports typed errors (`DataRejection`, `SettingError`,
//! `FitError`, `IngestError`); the binary flattens them into an `AppError`
//! carrying the process exit code.

use thiserror::Error;

use crate::domain::FitSettings;
use crate::fit::sqp::OptimizeResult;

/// Exit codes used by the `grainfit` binary.
pub mod exit {
    pub const USAGE: u8 = 2;
    pub const DATA_REJECTED: u8 = 3;
    pub const FIT_FAILED: u8 = 4;
    pub const CANCELLED: u8 = 5;
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Why a sample (or a whole dataset) was refused before fitting.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataRejection {
    #[error("sample name is missing")]
    NameNone,
    #[error("sample name is empty")]
    NameEmpty,
    #[error("size classes are missing")]
    XNone,
    #[error("frequencies are missing")]
    YNone,
    #[error("size classes ({x_len}) and frequencies ({y_len}) differ in length")]
    LengthNotEqual { x_len: usize, y_len: usize },
    #[error("size classes contain NaN")]
    XHasNan,
    #[error("frequencies contain NaN")]
    YHasNan,
    #[error("no size classes given")]
    NoClasses,
    #[error("size classes are not strictly increasing at index {index}")]
    ClassesNotIncreasing { index: usize },
    #[error("size class at index {index} is not a positive finite value")]
    NonPositiveClass { index: usize },
    #[error("frequency at index {index} is negative or infinite")]
    NegativeFrequency { index: usize },
    #[error("frequencies sum to {sum}, expected 1 (±0.01) or 100 (±1)")]
    SumNotNormalized { sum: f64 },
    #[error("samples mix fraction and percentage units (first mismatch: {sample})")]
    InconsistentNormalization { sample: String },
    #[error("only {len} informative class(es) remain after trimming, need at least 2")]
    InsufficientSupport { len: usize },
}

/// Invalid configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SettingError {
    #[error("unknown option '{}' (expected one of: {})", .0, FitSettings::OPTION_NAMES.join(", "))]
    UnknownOption(String),
    #[error("component count must be >= 1, got {0}")]
    InvalidComponentCount(usize),
    #[error("invalid value for '{name}': {reason}")]
    InvalidValue { name: &'static str, reason: String },
    #[error("failed to read settings: {0}")]
    Read(String),
}

/// Why `run_fit` did not produce a report.
#[derive(Debug, Clone, Error)]
pub enum FitError {
    #[error("no data prepared: feed a sample before fitting")]
    NotPrepared,
    #[error("global stage failed: {}", .0.termination)]
    GlobalStageFailed(Box<OptimizeResult>),
    #[error("final stage failed: {}", .0.termination)]
    FinalStageFailed(Box<OptimizeResult>),
    #[error("fitting cancelled")]
    Cancelled,
    #[error("fitting exception: {0}")]
    Exception(String),
}

impl FitError {
    /// Best-effort parameters carried by a stage failure, for diagnostics.
    pub fn partial_result(&self) -> Option<&OptimizeResult> {
        match self {
            FitError::GlobalStageFailed(r) | FitError::FinalStageFailed(r) => Some(r),
            _ => None,
        }
    }
}

/// Failures while reading a grain-size dataset file.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to open '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("line {line}: {message}")]
    Layout { line: usize, message: String },
    #[error("sample '{sample}' rejected: {reason}")]
    Rejected { sample: String, reason: DataRejection },
    #[error("dataset rejected: {0}")]
    Dataset(DataRejection),
}

impl From<DataRejection> for AppError {
    fn from(value: DataRejection) -> Self {
        AppError::new(exit::DATA_REJECTED, format!("Data rejected: {value}"))
    }
}

impl From<SettingError> for AppError {
    fn from(value: SettingError) -> Self {
        AppError::new(exit::USAGE, format!("Invalid settings: {value}"))
    }
}

impl From<IngestError> for AppError {
    fn from(value: IngestError) -> Self {
        let code = match value {
            IngestError::Rejected { .. } | IngestError::Dataset(_) => exit::DATA_REJECTED,
            _ => exit::USAGE,
        };
        AppError::new(code, value.to_string())
    }
}

impl From<FitError> for AppError {
    fn from(value: FitError) -> Self {
        let code = match value {
            FitError::Cancelled => exit::CANCELLED,
            _ => exit::FIT_FAILED,
        };
        AppError::new(code, value.to_string())
    }
}
