//! `FittingResolver`: validate, trim and fit one sample at a time.
//!
//! Lifecycle:
//!
//! - `feed_data` validates and trims a sample (`Idle` or any finished state
//!   → `DataFed`, or back to `Idle` on rejection)
//! - `run_fit` runs basin hopping, then a high-precision refinement, and
//!   derives a `FitReport` (`DataFed` → `Succeeded | Failed | Cancelled`)
//! - changing the family or component count drops the fed sample
//!
//! The resolver owns no thread and no global state; progress goes to the
//! `FitObserver` passed into each call.

use std::any::Any;
use std::ops::ControlFlow;
use std::panic::{AssertUnwindSafe, catch_unwind};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::{DistributionFamily, FitReport, FitSettings, Normalization, SampleSeries, StageOutcome};
use crate::error::{DataRejection, FitError, SettingError};
use crate::fit::basin_hopping::{BasinHopping, BasinHoppingOptions, HopHandler};
use crate::fit::objective::{MixtureObjective, Objective};
use crate::fit::observer::{CancellationToken, FitObserver, FitStage, IterationEvent};
use crate::fit::report::{StageSummary, derive_fit_report};
use crate::fit::sqp::{OptimizeResult, SqpMinimizer, SqpOptions, Termination};
use crate::fit::validate::validate_sample;
use crate::fit::window::FittingWindow;
use crate::models::MixtureModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolverState {
    Idle,
    DataFed,
    Fitting,
    Succeeded,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
struct PreparedSample {
    name: String,
    normalization: Normalization,
    window: FittingWindow,
}

#[derive(Debug, Clone)]
pub struct FittingResolver {
    settings: FitSettings,
    model: MixtureModel,
    state: ResolverState,
    sample: Option<PreparedSample>,
    last_report: Option<FitReport>,
}

impl FittingResolver {
    pub fn new(settings: FitSettings) -> Result<Self, SettingError> {
        settings.validate()?;
        let model = MixtureModel::new(settings.distribution_family, settings.component_count)?;
        Ok(Self {
            settings,
            model,
            state: ResolverState::Idle,
            sample: None,
            last_report: None,
        })
    }

    pub fn settings(&self) -> &FitSettings {
        &self.settings
    }

    pub fn state(&self) -> ResolverState {
        self.state
    }

    pub fn model(&self) -> &MixtureModel {
        &self.model
    }

    /// The trimmed window of the fed sample, if any.
    pub fn window(&self) -> Option<&FittingWindow> {
        self.sample.as_ref().map(|s| &s.window)
    }

    pub fn sample_name(&self) -> Option<&str> {
        self.sample.as_ref().map(|s| s.name.as_str())
    }

    pub fn last_report(&self) -> Option<&FitReport> {
        self.last_report.as_ref()
    }

    /// Validate, normalize to fractions and trim one sample.
    pub fn feed_data(
        &mut self,
        observer: &mut dyn FitObserver,
        name: Option<&str>,
        classes: Option<&[f64]>,
        frequencies: Option<&[f64]>,
    ) -> Result<&FittingWindow, DataRejection> {
        self.reset();
        match prepare(name, classes, frequencies) {
            Ok(prepared) => {
                debug!(
                    sample = %prepared.name,
                    start = prepared.window.start_index,
                    end = prepared.window.end_index,
                    normalization = ?prepared.normalization,
                    "sample fed"
                );
                observer.on_data_fed(&prepared.name);
                self.state = ResolverState::DataFed;
                let sample = self.sample.insert(prepared);
                Ok(&sample.window)
            }
            Err(reason) => {
                warn!(sample = name.unwrap_or("<none>"), %reason, "sample rejected");
                observer.on_data_rejected(name, &reason);
                Err(reason)
            }
        }
    }

    pub fn feed_sample(
        &mut self,
        observer: &mut dyn FitObserver,
        sample: &SampleSeries,
    ) -> Result<&FittingWindow, DataRejection> {
        self.feed_data(
            observer,
            Some(sample.name()),
            Some(sample.classes()),
            Some(sample.frequencies()),
        )
    }

    /// Switch the component family. Drops any fed sample.
    pub fn set_distribution_family(&mut self, family: DistributionFamily) {
        self.settings.distribution_family = family;
        self.model = self.rebuilt_model();
        self.reset();
    }

    /// Change the number of components (`n >= 1`). Drops any fed sample.
    pub fn set_component_count(&mut self, component_count: usize) -> Result<(), SettingError> {
        let model = MixtureModel::new(self.settings.distribution_family, component_count)?;
        self.settings.component_count = component_count;
        self.model = model;
        self.reset();
        Ok(())
    }

    /// Update one numeric option by name.
    ///
    /// Changing `component_count` this way behaves like
    /// [`FittingResolver::set_component_count`]; other options keep the fed
    /// sample.
    pub fn change_setting(&mut self, name: &str, value: f64) -> Result<(), SettingError> {
        let before = self.settings.component_count;
        self.settings.set_option(name, value)?;
        if self.settings.component_count != before {
            self.model = self.rebuilt_model();
            self.reset();
        }
        Ok(())
    }

    /// Fit the fed sample.
    pub fn run_fit(
        &mut self,
        observer: &mut dyn FitObserver,
        cancel: &CancellationToken,
    ) -> Result<FitReport, FitError> {
        self.fit_with(observer, cancel, None)
    }

    /// Body of `run_fit`. A given `objective` replaces the mixture residuals
    /// of the fed sample.
    fn fit_with(
        &mut self,
        observer: &mut dyn FitObserver,
        cancel: &CancellationToken,
        objective: Option<&dyn Objective>,
    ) -> Result<FitReport, FitError> {
        let sample = match (&self.sample, self.state) {
            (Some(sample), ResolverState::DataFed) => sample,
            _ => {
                debug!(state = ?self.state, "fit requested without prepared data");
                observer.on_data_not_prepared();
                return Err(FitError::NotPrepared);
            }
        };

        self.state = ResolverState::Fitting;
        observer.on_fitting_started();

        let stages = Stages {
            settings: &self.settings,
            model: &self.model,
            sample,
            objective,
        };
        let outcome = catch_unwind(AssertUnwindSafe(|| stages.run(&mut *observer, cancel)))
            .unwrap_or_else(|payload| Err(FitError::Exception(panic_message(payload.as_ref()))));

        match &outcome {
            Ok(report) => {
                info!(
                    sample = %report.sample_name,
                    mse = report.mse,
                    hops = report.global_hops,
                    "fit succeeded"
                );
                self.state = ResolverState::Succeeded;
                self.last_report = Some(report.clone());
                observer.on_fitting_succeeded(report);
            }
            Err(FitError::Cancelled) => {
                info!("fit cancelled");
                self.state = ResolverState::Cancelled;
                observer.on_fitting_cancelled();
            }
            Err(err) => {
                warn!(%err, "fit failed");
                self.state = ResolverState::Failed;
                observer.on_fitting_failed(err);
            }
        }
        observer.on_fitting_finished();
        outcome
    }

    fn rebuilt_model(&self) -> MixtureModel {
        // Counts are validated before they reach the settings.
        MixtureModel::new(self.settings.distribution_family, self.settings.component_count)
            .unwrap_or(self.model)
    }

    fn reset(&mut self) {
        self.sample = None;
        self.last_report = None;
        self.state = ResolverState::Idle;
    }
}

fn prepare(
    name: Option<&str>,
    classes: Option<&[f64]>,
    frequencies: Option<&[f64]>,
) -> Result<PreparedSample, DataRejection> {
    let normalization = validate_sample(name, classes, frequencies)?;
    let name = name.ok_or(DataRejection::NameNone)?;
    let classes = classes.ok_or(DataRejection::XNone)?;
    let frequencies = frequencies.ok_or(DataRejection::YNone)?;

    let divisor = normalization.divisor();
    let fractions: Vec<f64> = frequencies.iter().map(|v| v / divisor).collect();
    let window = FittingWindow::from_series(classes, &fractions)?;
    Ok(PreparedSample {
        name: name.to_string(),
        normalization,
        window,
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic during fitting".to_string()
    }
}

/// Outcome label of an acceptable stage result.
fn stage_outcome(termination: Termination) -> Result<StageOutcome, FitError> {
    match termination {
        Termination::Converged => Ok(StageOutcome::Converged),
        Termination::IterationLimit => Ok(StageOutcome::AcceptableLimit),
        Termination::LineSearchFailed
        | Termination::QpFailed
        | Termination::NonFinite
        | Termination::Interrupted => Err(FitError::Exception(format!(
            "unacceptable termination reported as success: {termination}"
        ))),
    }
}

/// Borrowed inputs of one `run_fit`.
struct Stages<'a> {
    settings: &'a FitSettings,
    model: &'a MixtureModel,
    sample: &'a PreparedSample,
    objective: Option<&'a dyn Objective>,
}

impl Stages<'_> {
    fn run(
        &self,
        observer: &mut dyn FitObserver,
        cancel: &CancellationToken,
    ) -> Result<FitReport, FitError> {
        let window = &self.sample.window;
        let mixture = MixtureObjective::new(self.model, &window.fit_x, &window.fit_y);
        let objective: &dyn Objective = match self.objective {
            Some(objective) => objective,
            None => &mixture,
        };
        let bounds = self.model.bounds();
        let constraints = self.model.constraints();
        let x0 = self.model.default_parameters(window.len() as f64);

        let f0 = objective.value(&x0);
        if !f0.is_finite() {
            return Err(FitError::Exception(
                "objective is not finite at the initial parameters".to_string(),
            ));
        }

        debug!(
            sample = %self.sample.name,
            family = self.model.family().display_name(),
            components = self.model.component_count(),
            classes = window.len(),
            stage = FitStage::Global.display_name(),
            "stage started"
        );
        let local = SqpMinimizer::new(
            &bounds,
            &constraints,
            SqpOptions {
                tolerance: self.settings.local_tolerance,
                max_iterations: self.settings.local_max_iterations,
            },
        );
        let mut runner = StageRunner {
            objective,
            minimizer: local,
            observer: &mut *observer,
            cancel,
            cancelled: false,
        };
        let global = BasinHopping::new(BasinHoppingOptions {
            max_iterations: self.settings.global_max_iterations,
            success_iterations: self.settings.global_success_iterations,
            step_size: self.settings.global_step_size,
            temperature: self.settings.global_temperature,
            seed: self.settings.seed,
        })
        .run(&x0, &bounds, &mut runner);

        if runner.cancelled || cancel.is_cancelled() {
            return Err(FitError::Cancelled);
        }
        let Some(best) = global.lowest else {
            let partial = global.lowest_finite.unwrap_or(global.last);
            return Err(FitError::GlobalStageFailed(Box::new(partial)));
        };
        debug!(
            hops = global.hops,
            accepted = global.accepted,
            step = global.final_step_size,
            fun = best.fun,
            stage = FitStage::Global.display_name(),
            "stage finished"
        );

        let refine = SqpMinimizer::new(
            &bounds,
            &constraints,
            SqpOptions {
                tolerance: self.settings.final_tolerance,
                max_iterations: self.settings.final_max_iterations,
            },
        );
        let refined = refine.minimize(objective, &best.x, |iteration, parameters, value| {
            observer.on_iteration(IterationEvent::Local {
                stage: FitStage::Final,
                iteration,
                parameters,
                objective: value,
            });
            if cancel.is_cancelled() {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        if refined.termination == Termination::Interrupted && cancel.is_cancelled() {
            return Err(FitError::Cancelled);
        }
        if !refined.is_acceptable() {
            return Err(FitError::FinalStageFailed(Box::new(refined)));
        }
        debug!(
            iterations = refined.iterations,
            fun = refined.fun,
            termination = %refined.termination,
            stage = FitStage::Final.display_name(),
            "stage finished"
        );

        derive_fit_report(
            &self.sample.name,
            self.model,
            self.sample.normalization,
            window,
            &refined.x,
            StageSummary {
                global_outcome: stage_outcome(best.termination)?,
                final_outcome: stage_outcome(refined.termination)?,
                global_hops: global.hops,
                final_iterations: refined.iterations,
            },
        )
    }
}

/// Adapts the global stage to the observer and the cancellation token.
struct StageRunner<'a> {
    objective: &'a dyn Objective,
    minimizer: SqpMinimizer<'a>,
    observer: &'a mut dyn FitObserver,
    cancel: &'a CancellationToken,
    cancelled: bool,
}

impl HopHandler for StageRunner<'_> {
    fn minimize(&mut self, x0: &[f64]) -> OptimizeResult {
        if self.cancelled || self.cancel.is_cancelled() {
            self.cancelled = true;
            return OptimizeResult::interrupted(x0);
        }
        let observer = &mut *self.observer;
        let cancel = self.cancel;
        let cancelled = &mut self.cancelled;
        self.minimizer
            .minimize(self.objective, x0, |iteration, parameters, objective| {
                observer.on_iteration(IterationEvent::Local {
                    stage: FitStage::Global,
                    iteration,
                    parameters,
                    objective,
                });
                if cancel.is_cancelled() {
                    *cancelled = true;
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
    }

    fn on_hop(&mut self, hop: usize, result: &OptimizeResult, accepted: bool) -> ControlFlow<()> {
        if self.cancelled {
            return ControlFlow::Break(());
        }
        self.observer.on_iteration(IterationEvent::Global {
            hop,
            parameters: &result.x,
            objective: result.fun,
            accepted,
        });
        if self.cancel.is_cancelled() {
            self.cancelled = true;
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::fit::observer::NoopObserver;

    #[derive(Default)]
    struct Recorder {
        events: Vec<&'static str>,
    }

    impl FitObserver for Recorder {
        fn on_data_rejected(&mut self, _: Option<&str>, _: &DataRejection) {
            self.events.push("rejected");
        }
        fn on_data_fed(&mut self, _: &str) {
            self.events.push("fed");
        }
        fn on_data_not_prepared(&mut self) {
            self.events.push("not_prepared");
        }
        fn on_fitting_started(&mut self) {
            self.events.push("started");
        }
        fn on_fitting_succeeded(&mut self, _: &FitReport) {
            self.events.push("succeeded");
        }
        fn on_fitting_failed(&mut self, _: &FitError) {
            self.events.push("failed");
        }
        fn on_fitting_cancelled(&mut self) {
            self.events.push("cancelled");
        }
        fn on_fitting_finished(&mut self) {
            self.events.push("finished");
        }
    }

    fn resolver(family: DistributionFamily, n: usize) -> FittingResolver {
        FittingResolver::new(FitSettings {
            distribution_family: family,
            component_count: n,
            ..FitSettings::default()
        })
        .unwrap()
    }

    #[test]
    fn rejection_leaves_resolver_idle() {
        let mut r = resolver(DistributionFamily::Weibull, 1);
        let mut rec = Recorder::default();
        let x = [1.0, 2.0, 3.0];
        r.feed_data(&mut rec, Some("ok"), Some(&x), Some(&[0.2, 0.5, 0.3])).unwrap();
        assert_eq!(r.state(), ResolverState::DataFed);

        let err = r
            .feed_data(&mut rec, Some("bad"), Some(&x), Some(&[10.0, 20.0, 20.0]))
            .unwrap_err();
        assert_eq!(err, DataRejection::SumNotNormalized { sum: 50.0 });
        assert_eq!(r.state(), ResolverState::Idle);
        assert!(r.window().is_none());
        assert_eq!(rec.events, vec!["fed", "rejected"]);
    }

    #[test]
    fn percentages_are_fitted_as_fractions() {
        let mut r = resolver(DistributionFamily::Normal, 1);
        let window = r
            .feed_data(
                &mut NoopObserver,
                Some("pct"),
                Some(&[1.0, 2.0, 3.0, 4.0]),
                Some(&[10.0, 40.0, 40.0, 10.0]),
            )
            .unwrap();
        assert_eq!(window.fit_y, vec![0.1, 0.4, 0.4, 0.1]);
    }

    #[test]
    fn fit_without_data_is_not_prepared() {
        let mut r = resolver(DistributionFamily::Weibull, 2);
        let mut rec = Recorder::default();
        let err = r.run_fit(&mut rec, &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, FitError::NotPrepared));
        assert_eq!(rec.events, vec!["not_prepared"]);
        assert_eq!(r.state(), ResolverState::Idle);
    }

    #[test]
    fn component_count_change_drops_sample() {
        let mut r = resolver(DistributionFamily::Weibull, 2);
        r.feed_data(
            &mut NoopObserver,
            Some("S"),
            Some(&[1.0, 2.0, 3.0]),
            Some(&[0.2, 0.5, 0.3]),
        )
        .unwrap();
        assert_eq!(
            r.set_component_count(0),
            Err(SettingError::InvalidComponentCount(0))
        );
        assert_eq!(r.state(), ResolverState::DataFed);

        r.set_component_count(3).unwrap();
        assert_eq!(r.model().component_count(), 3);
        assert_eq!(r.state(), ResolverState::Idle);
        assert!(r.sample_name().is_none());
    }

    #[test]
    fn unknown_setting_is_rejected() {
        let mut r = resolver(DistributionFamily::Weibull, 2);
        assert_eq!(
            r.change_setting("no_such_option", 1.0),
            Err(SettingError::UnknownOption("no_such_option".to_string()))
        );
        r.change_setting("global_max_iterations", 10.0).unwrap();
        assert_eq!(r.settings().global_max_iterations, 10);
    }

    #[test]
    fn pre_cancelled_fit_ends_cancelled() {
        let mut r = resolver(DistributionFamily::Normal, 1);
        let mut rec = Recorder::default();
        r.feed_data(
            &mut rec,
            Some("S"),
            Some(&[1.0, 2.0, 3.0, 4.0, 5.0]),
            Some(&[0.1, 0.2, 0.4, 0.2, 0.1]),
        )
        .unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let err = r.run_fit(&mut rec, &token).unwrap_err();
        assert!(matches!(err, FitError::Cancelled));
        assert_eq!(r.state(), ResolverState::Cancelled);
        assert_eq!(rec.events, vec!["fed", "started", "cancelled", "finished"]);
    }

    #[test]
    fn final_stage_limit_is_acceptable() {
        let mut r = resolver(DistributionFamily::Normal, 1);
        r.change_setting("final_max_iterations", 1.0).unwrap();
        let (classes, y) = bell();
        r.feed_data(&mut NoopObserver, Some("S"), Some(&classes), Some(&y)).unwrap();
        let report = r.run_fit(&mut NoopObserver, &CancellationToken::new()).unwrap();
        assert!(matches!(
            report.final_outcome,
            StageOutcome::Converged | StageOutcome::AcceptableLimit
        ));
        assert!(report.final_iterations <= 1);
    }

    /// Squared distance to `target`.
    struct Bowl {
        target: [f64; 3],
    }

    impl Objective for Bowl {
        fn value(&self, p: &[f64]) -> f64 {
            p.iter().zip(self.target).map(|(v, t)| (v - t).powi(2)).sum()
        }
    }

    /// Finite at the start point, NaN from then on.
    struct NanAfterFirst {
        calls: Cell<usize>,
    }

    impl Objective for NanAfterFirst {
        fn value(&self, _: &[f64]) -> f64 {
            let calls = self.calls.get();
            self.calls.set(calls + 1);
            if calls == 0 { 1.0 } else { f64::NAN }
        }
    }

    /// A bowl whose gradient points the wrong way, so no step ever descends.
    struct UphillGradient(Bowl);

    impl Objective for UphillGradient {
        fn value(&self, p: &[f64]) -> f64 {
            self.0.value(p)
        }

        fn gradient(&self, p: &[f64]) -> Vec<f64> {
            p.iter().zip(self.0.target).map(|(v, t)| -2.0 * (v - t)).collect()
        }
    }

    struct Exploding;

    impl Objective for Exploding {
        fn value(&self, _: &[f64]) -> f64 {
            panic!("density table corrupted")
        }
    }

    /// A bowl that turns NaN once the observer has seen the first hop.
    struct PoisonedAfterHop {
        bowl: Bowl,
        poisoned: Rc<Cell<bool>>,
    }

    impl Objective for PoisonedAfterHop {
        fn value(&self, p: &[f64]) -> f64 {
            if self.poisoned.get() { f64::NAN } else { self.bowl.value(p) }
        }
    }

    struct PoisonOnHop {
        recorder: Recorder,
        poisoned: Rc<Cell<bool>>,
    }

    impl FitObserver for PoisonOnHop {
        fn on_iteration(&mut self, event: IterationEvent<'_>) {
            if matches!(event, IterationEvent::Global { .. }) {
                self.poisoned.set(true);
            }
        }
        fn on_fitting_started(&mut self) {
            self.recorder.on_fitting_started();
        }
        fn on_fitting_failed(&mut self, err: &FitError) {
            self.recorder.on_fitting_failed(err);
        }
        fn on_fitting_finished(&mut self) {
            self.recorder.on_fitting_finished();
        }
    }

    fn bell() -> (Vec<f64>, Vec<f64>) {
        let classes: Vec<f64> = (1..=9).map(f64::from).collect();
        let raw: Vec<f64> = (1..=9)
            .map(|j| (-(j as f64 - 5.0).powi(2) / 4.0).exp())
            .collect();
        let total: f64 = raw.iter().sum();
        (classes, raw.iter().map(|v| v / total).collect())
    }

    fn fed_weibull() -> FittingResolver {
        let mut r = resolver(DistributionFamily::Weibull, 1);
        let (classes, y) = bell();
        r.feed_data(&mut NoopObserver, Some("S"), Some(&classes), Some(&y)).unwrap();
        r
    }

    /// Fails with `objective`, then checks a fresh feed fits normally.
    fn fail_then_refit(objective: &dyn Objective) -> FitError {
        let mut r = fed_weibull();
        let mut rec = Recorder::default();
        let err = r
            .fit_with(&mut rec, &CancellationToken::new(), Some(objective))
            .unwrap_err();
        assert_eq!(rec.events, vec!["started", "failed", "finished"]);
        assert_eq!(r.state(), ResolverState::Failed);
        assert!(r.last_report().is_none());
        assert_refits(&mut r);
        err
    }

    fn assert_refits(r: &mut FittingResolver) {
        let mut rec = Recorder::default();
        let (classes, y) = bell();
        r.feed_data(&mut rec, Some("S"), Some(&classes), Some(&y)).unwrap();
        assert_eq!(r.state(), ResolverState::DataFed);
        r.run_fit(&mut rec, &CancellationToken::new()).unwrap();
        assert_eq!(r.state(), ResolverState::Succeeded);
        assert_eq!(rec.events, vec!["fed", "started", "succeeded", "finished"]);
    }

    #[test]
    fn non_finite_local_solves_fail_the_global_stage() {
        let err = fail_then_refit(&NanAfterFirst { calls: Cell::new(0) });
        let FitError::GlobalStageFailed(partial) = &err else {
            panic!("unexpected error {err:?}");
        };
        assert_eq!(partial.termination, Termination::NonFinite);
        assert!(err.partial_result().is_some());
    }

    #[test]
    fn failed_line_searches_carry_the_lowest_start() {
        let uphill = UphillGradient(Bowl {
            target: [50.0, 50.0, 0.0],
        });
        let err = fail_then_refit(&uphill);
        let Some(partial) = err.partial_result() else {
            panic!("no partial result in {err:?}");
        };
        assert!(matches!(err, FitError::GlobalStageFailed(_)));
        assert_eq!(partial.termination, Termination::LineSearchFailed);
        assert!(partial.fun.is_finite());
        // Solves never leave their start; hop 0 starts at the seed, and the
        // carried result is no worse than it.
        let seed = MixtureModel::new(DistributionFamily::Weibull, 1)
            .unwrap()
            .default_parameters(9.0);
        assert!(partial.fun <= uphill.value(&seed));
    }

    #[test]
    fn non_finite_refinement_fails_the_final_stage() {
        let poisoned = Rc::new(Cell::new(false));
        let objective = PoisonedAfterHop {
            bowl: Bowl {
                target: [3.0, 2.0, 1.0],
            },
            poisoned: Rc::clone(&poisoned),
        };
        let mut observer = PoisonOnHop {
            recorder: Recorder::default(),
            poisoned,
        };
        let mut r = fed_weibull();
        let err = r
            .fit_with(&mut observer, &CancellationToken::new(), Some(&objective))
            .unwrap_err();
        assert_eq!(observer.recorder.events, vec!["started", "failed", "finished"]);
        assert_eq!(r.state(), ResolverState::Failed);
        let FitError::FinalStageFailed(partial) = &err else {
            panic!("unexpected error {err:?}");
        };
        assert_eq!(partial.termination, Termination::NonFinite);
        assert!(err.partial_result().is_some());
        assert_refits(&mut r);
    }

    #[test]
    fn panicking_objective_becomes_an_exception() {
        let err = fail_then_refit(&Exploding);
        assert!(
            matches!(&err, FitError::Exception(msg) if msg.contains("density table corrupted")),
            "{err:?}"
        );
        assert!(err.partial_result().is_none());
    }

    #[test]
    fn unacceptable_terminations_have_no_outcome_label() {
        assert_eq!(stage_outcome(Termination::Converged).ok(), Some(StageOutcome::Converged));
        assert_eq!(
            stage_outcome(Termination::IterationLimit).ok(),
            Some(StageOutcome::AcceptableLimit)
        );
        for t in [
            Termination::LineSearchFailed,
            Termination::QpFailed,
            Termination::NonFinite,
            Termination::Interrupted,
        ] {
            assert!(matches!(stage_outcome(t), Err(FitError::Exception(_))), "{t:?}");
        }
    }

    #[test]
    fn successful_fit_stores_report() {
        let mut r = resolver(DistributionFamily::Normal, 1);
        let mut rec = Recorder::default();
        let classes: Vec<f64> = (1..=9).map(f64::from).collect();
        let raw: Vec<f64> = (1..=9)
            .map(|j| (-(j as f64 - 5.0).powi(2) / 4.0).exp())
            .collect();
        let total: f64 = raw.iter().sum();
        let y: Vec<f64> = raw.iter().map(|v| v / total).collect();
        r.feed_data(&mut rec, Some("S"), Some(&classes), Some(&y)).unwrap();

        let report = r.run_fit(&mut rec, &CancellationToken::new()).unwrap();
        assert_eq!(r.state(), ResolverState::Succeeded);
        assert_eq!(r.last_report(), Some(&report));
        assert_eq!(rec.events, vec!["fed", "started", "succeeded", "finished"]);
        assert!((report.weight_sum() - 1.0).abs() < 1e-6);
        assert!((report.statistics[0].mean - 5.0).abs() < 0.05);
    }
}
