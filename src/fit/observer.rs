//! Progress notifications and cooperative cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::domain::FitReport;
use crate::error::{DataRejection, FitError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitStage {
    /// Basin hopping over local SLSQP-style solves.
    Global,
    /// High-precision refinement of the global minimum.
    Final,
}

impl FitStage {
    pub fn display_name(self) -> &'static str {
        match self {
            FitStage::Global => "global",
            FitStage::Final => "final",
        }
    }
}

/// One progress notification from a running fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IterationEvent<'a> {
    /// A local solver iteration inside `stage`.
    Local {
        stage: FitStage,
        iteration: usize,
        parameters: &'a [f64],
        objective: f64,
    },
    /// A completed basin hop (hop 0 is the initial local solve).
    Global {
        hop: usize,
        parameters: &'a [f64],
        objective: f64,
        accepted: bool,
    },
}

/// Receives resolver lifecycle events. Every method defaults to a no-op.
///
/// Events for one `run_fit` arrive in order: `on_fitting_started`, any number
/// of `on_iteration`, exactly one of succeeded / failed / cancelled, then
/// `on_fitting_finished`.
pub trait FitObserver {
    fn on_data_rejected(&mut self, _sample: Option<&str>, _reason: &DataRejection) {}
    fn on_data_fed(&mut self, _sample: &str) {}
    fn on_data_not_prepared(&mut self) {}
    fn on_fitting_started(&mut self) {}
    fn on_iteration(&mut self, _event: IterationEvent<'_>) {}
    fn on_fitting_succeeded(&mut self, _report: &FitReport) {}
    fn on_fitting_failed(&mut self, _error: &FitError) {}
    fn on_fitting_cancelled(&mut self) {}
    fn on_fitting_finished(&mut self) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl FitObserver for NoopObserver {}

/// Shared cancellation flag, checked between solver iterations.
#[derive(Debug, Default, Clone)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
