//! Shared "fit pipeline": one resolver, samples fitted one after another.
//!
//! dataset -> feed sample -> run fit -> report, repeated per requested sample.
//! A failing sample does not stop the run; its error is kept next to the
//! other outcomes so the caller can print everything and pick the exit code.

use tracing::{debug, trace};

use crate::domain::{FitReport, FitSettings, GrainSizeDataset};
use crate::error::{AppError, FitError, exit};
use crate::fit::{CancellationToken, FitObserver, FittingResolver, IterationEvent};

/// Why one sample produced no report.
#[derive(Debug, Clone)]
pub enum SampleFailure {
    Rejected(crate::error::DataRejection),
    Fit(FitError),
}

impl std::fmt::Display for SampleFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleFailure::Rejected(reason) => write!(f, "Data rejected: {reason}"),
            SampleFailure::Fit(err) => write!(f, "Fit failed: {err}"),
        }
    }
}

impl From<SampleFailure> for AppError {
    fn from(value: SampleFailure) -> Self {
        match value {
            SampleFailure::Rejected(reason) => reason.into(),
            SampleFailure::Fit(err) => err.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SampleOutcome {
    pub sample: String,
    pub result: Result<FitReport, SampleFailure>,
}

/// All outcomes of a single `grainfit fit` run, in request order.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub outcomes: Vec<SampleOutcome>,
}

impl RunOutput {
    pub fn reports(&self) -> Vec<FitReport> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().cloned())
            .collect()
    }

    /// The first failure, flattened for the exit code.
    pub fn first_error(&self) -> Option<AppError> {
        self.outcomes.iter().find_map(|o| match &o.result {
            Ok(_) => None,
            Err(failure) => Some(AppError::from(failure.clone())),
        })
    }
}

/// Counts progress events and traces hop summaries.
#[derive(Debug, Default)]
struct ProgressLog {
    local_iterations: usize,
    hops: usize,
}

impl FitObserver for ProgressLog {
    fn on_fitting_started(&mut self) {
        self.local_iterations = 0;
        self.hops = 0;
    }

    fn on_iteration(&mut self, event: IterationEvent<'_>) {
        match event {
            IterationEvent::Local { .. } => self.local_iterations += 1,
            IterationEvent::Global {
                hop,
                objective,
                accepted,
                ..
            } => {
                self.hops += 1;
                trace!(hop, objective, accepted, "hop");
            }
        }
    }

    fn on_fitting_finished(&mut self) {
        debug!(
            hops = self.hops,
            local_iterations = self.local_iterations,
            "fit finished"
        );
    }
}

/// Fit `names` (every sample when empty) one after another.
pub fn run_fits(
    dataset: &GrainSizeDataset,
    settings: &FitSettings,
    names: &[String],
    cancel: &CancellationToken,
) -> Result<RunOutput, AppError> {
    let selected: Vec<&str> = if names.is_empty() {
        dataset.sample_names().collect()
    } else {
        for name in names {
            if dataset.sample_names().all(|n| n != name.as_str()) {
                return Err(AppError::new(exit::USAGE, format!("Unknown sample '{name}'.")));
            }
        }
        names.iter().map(String::as_str).collect()
    };

    let mut resolver = FittingResolver::new(settings.clone())?;
    let mut progress = ProgressLog::default();
    let mut outcomes = Vec::with_capacity(selected.len());

    for name in selected {
        let result = match dataset.series(name) {
            Some(Ok(series)) => {
                let fed = resolver.feed_sample(&mut progress, &series).map(|_| ());
                match fed {
                    Ok(()) => resolver.run_fit(&mut progress, cancel).map_err(SampleFailure::Fit),
                    Err(reason) => Err(SampleFailure::Rejected(reason)),
                }
            }
            Some(Err(reason)) => Err(SampleFailure::Rejected(reason)),
            None => Err(SampleFailure::Fit(FitError::NotPrepared)),
        };
        outcomes.push(SampleOutcome {
            sample: name.to_string(),
            result,
        });
        if cancel.is_cancelled() {
            break;
        }
    }

    Ok(RunOutput { outcomes })
}
