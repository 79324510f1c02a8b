//! Basin hopping: random restarts of a local minimizer with Metropolis acceptance.
//!
//! Each hop perturbs the current point by a uniform displacement in
//! `[-step, step]` per coordinate (clamped to the bounds), runs the local
//! minimizer from there, and accepts the new minimum with probability
//! `min(1, exp(-(f_new - f_old) / T))`. Only acceptable local results can be
//! accepted or become the lowest minimum. The step size adapts every
//! `ADAPT_INTERVAL` hops towards a target acceptance rate.
//!
//! The displacement RNG is a seeded `StdRng`, so a run is reproducible for a
//! given seed and start point.

use std::ops::ControlFlow;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Uniform};
use tracing::trace;

use crate::fit::sqp::OptimizeResult;

const ADAPT_INTERVAL: usize = 50;
const ADAPT_FACTOR: f64 = 0.9;
const TARGET_ACCEPT_RATE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BasinHoppingOptions {
    pub max_iterations: usize,
    /// Consecutive hops without a new lowest minimum before stopping.
    pub success_iterations: usize,
    pub step_size: f64,
    pub temperature: f64,
    pub seed: u64,
}

/// Local solver and per-hop callback driven by [`BasinHopping::run`].
pub trait HopHandler {
    fn minimize(&mut self, x0: &[f64]) -> OptimizeResult;

    /// Called after every hop (hop 0 is the initial minimization).
    fn on_hop(&mut self, hop: usize, result: &OptimizeResult, accepted: bool) -> ControlFlow<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct BasinHoppingResult {
    /// Lowest acceptable local minimum, if any hop produced one.
    pub lowest: Option<OptimizeResult>,
    /// Lowest finite-valued local result, acceptable or not.
    pub lowest_finite: Option<OptimizeResult>,
    /// The most recent local result.
    pub last: OptimizeResult,
    /// Hops performed after the initial minimization.
    pub hops: usize,
    pub accepted: usize,
    pub final_step_size: f64,
    pub interrupted: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct BasinHopping {
    options: BasinHoppingOptions,
}

impl BasinHopping {
    pub fn new(options: BasinHoppingOptions) -> Self {
        Self { options }
    }

    pub fn run<H: HopHandler + ?Sized>(
        &self,
        x0: &[f64],
        bounds: &[(f64, f64)],
        handler: &mut H,
    ) -> BasinHoppingResult {
        let mut rng = StdRng::seed_from_u64(self.options.seed);
        let mut step = self.options.step_size;

        let initial = handler.minimize(x0);
        let mut lowest = initial.is_acceptable().then(|| initial.clone());
        let mut lowest_finite = initial.fun.is_finite().then(|| initial.clone());
        let mut current = initial.clone();
        let mut last = initial;

        let result = |lowest, lowest_finite, last, hops, accepted, step, interrupted| BasinHoppingResult {
            lowest,
            lowest_finite,
            last,
            hops,
            accepted,
            final_step_size: step,
            interrupted,
        };

        if handler.on_hop(0, &last, lowest.is_some()).is_break() {
            return result(lowest, lowest_finite, last, 0, 0, step, true);
        }

        let mut hops = 0;
        let mut accepted_total = 0;
        let mut accepted_window = 0;
        let mut stale = 0;

        for hop in 1..=self.options.max_iterations {
            hops = hop;
            let displacement = Uniform::new_inclusive(-step, step);
            let trial: Vec<f64> = current
                .x
                .iter()
                .zip(bounds)
                .map(|(v, b)| (v + displacement.sample(&mut rng)).clamp(b.0, b.1))
                .collect();

            let candidate = handler.minimize(&trial);
            let acceptable = candidate.is_acceptable();
            let accepted = acceptable && self.metropolis(&mut rng, current.fun, candidate.fun);

            let improved = acceptable
                && lowest
                    .as_ref()
                    .is_none_or(|best: &OptimizeResult| candidate.fun < best.fun);
            if improved {
                lowest = Some(candidate.clone());
                stale = 0;
            } else {
                stale += 1;
            }
            if candidate.fun.is_finite()
                && lowest_finite
                    .as_ref()
                    .is_none_or(|best: &OptimizeResult| candidate.fun < best.fun)
            {
                lowest_finite = Some(candidate.clone());
            }

            trace!(hop, fun = candidate.fun, accepted, improved, step, "basin hop");

            let flow = handler.on_hop(hop, &candidate, accepted);
            if accepted {
                accepted_total += 1;
                accepted_window += 1;
                current = candidate.clone();
            }
            last = candidate;
            if flow.is_break() {
                return result(lowest, lowest_finite, last, hops, accepted_total, step, true);
            }

            if hop % ADAPT_INTERVAL == 0 {
                let rate = accepted_window as f64 / ADAPT_INTERVAL as f64;
                step = if rate > TARGET_ACCEPT_RATE {
                    step / ADAPT_FACTOR
                } else {
                    step * ADAPT_FACTOR
                };
                accepted_window = 0;
            }

            if stale >= self.options.success_iterations {
                break;
            }
        }

        result(lowest, lowest_finite, last, hops, accepted_total, step, false)
    }

    fn metropolis(&self, rng: &mut StdRng, f_old: f64, f_new: f64) -> bool {
        if !f_old.is_finite() || f_new < f_old {
            return true;
        }
        let t = self.options.temperature;
        if t <= 0.0 {
            return false;
        }
        let p = (-(f_new - f_old) / t).exp();
        rng.r#gen::<f64>() < p
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::objective::Objective;
    use crate::fit::sqp::{SqpMinimizer, SqpOptions, Termination};

    /// Two wells: a shallow one near -1 and the global one near 2.
    struct DoubleWell;

    impl Objective for DoubleWell {
        fn value(&self, p: &[f64]) -> f64 {
            let x = p[0];
            0.1 * (x + 1.0).powi(2) * (x - 2.0).powi(2) - 0.3 * x
        }
    }

    struct Local<'a> {
        sqp: SqpMinimizer<'a>,
        hops: Vec<usize>,
        stop_at: Option<usize>,
    }

    impl HopHandler for Local<'_> {
        fn minimize(&mut self, x0: &[f64]) -> OptimizeResult {
            self.sqp
                .minimize(&DoubleWell, x0, |_, _, _| ControlFlow::Continue(()))
        }

        fn on_hop(&mut self, hop: usize, _: &OptimizeResult, _: bool) -> ControlFlow<()> {
            self.hops.push(hop);
            match self.stop_at {
                Some(h) if h == hop => ControlFlow::Break(()),
                _ => ControlFlow::Continue(()),
            }
        }
    }

    fn options(seed: u64) -> BasinHoppingOptions {
        BasinHoppingOptions {
            max_iterations: 100,
            success_iterations: 30,
            step_size: 2.0,
            temperature: 1.0,
            seed,
        }
    }

    fn local(bounds: &[(f64, f64)], stop_at: Option<usize>) -> Local<'_> {
        Local {
            sqp: SqpMinimizer::new(
                bounds,
                &[],
                SqpOptions {
                    tolerance: 1e-12,
                    max_iterations: 200,
                },
            ),
            hops: Vec::new(),
            stop_at,
        }
    }

    #[test]
    fn escapes_shallow_well() {
        let bounds = [(-4.0, 5.0)];
        let mut handler = local(&bounds, None);
        let res = BasinHopping::new(options(7)).run(&[-1.0], &bounds, &mut handler);
        let best = res.lowest.unwrap();
        assert!(best.x[0] > 1.5, "stuck at {:?}", best.x);
        assert!(!res.interrupted);
        assert_eq!(handler.hops[0], 0);
    }

    #[test]
    fn same_seed_same_run() {
        let bounds = [(-4.0, 5.0)];
        let mut a = local(&bounds, None);
        let mut b = local(&bounds, None);
        let ra = BasinHopping::new(options(11)).run(&[0.0], &bounds, &mut a);
        let rb = BasinHopping::new(options(11)).run(&[0.0], &bounds, &mut b);
        assert_eq!(ra, rb);
        assert_eq!(a.hops, b.hops);
    }

    #[test]
    fn stops_after_stale_hops() {
        let bounds = [(-4.0, 5.0)];
        let mut handler = local(&bounds, None);
        let mut opts = options(3);
        opts.success_iterations = 2;
        let res = BasinHopping::new(opts).run(&[2.0], &bounds, &mut handler);
        assert!(res.hops < opts.max_iterations);
        assert!(res.lowest.is_some());
    }

    #[test]
    fn break_from_handler_interrupts() {
        let bounds = [(-4.0, 5.0)];
        let mut handler = local(&bounds, Some(1));
        let res = BasinHopping::new(options(5)).run(&[0.0], &bounds, &mut handler);
        assert!(res.interrupted);
        assert_eq!(res.hops, 1);
        assert_eq!(handler.hops, vec![0, 1]);
    }

    #[test]
    fn unacceptable_results_never_become_lowest() {
        /// Fails every solve; the values run 5, 2, 7, 3, NaN, ...
        struct Failing {
            calls: usize,
        }
        impl HopHandler for Failing {
            fn minimize(&mut self, x0: &[f64]) -> OptimizeResult {
                let fun = [5.0, 2.0, 7.0, 3.0, f64::NAN][self.calls % 5];
                self.calls += 1;
                OptimizeResult {
                    termination: Termination::LineSearchFailed,
                    fun,
                    constraint_violation: 0.0,
                    ..OptimizeResult::interrupted(x0)
                }
            }
            fn on_hop(&mut self, _: usize, _: &OptimizeResult, accepted: bool) -> ControlFlow<()> {
                assert!(!accepted);
                ControlFlow::Continue(())
            }
        }
        let bounds = [(0.0, 1.0)];
        let mut opts = options(1);
        opts.success_iterations = 3;
        let mut handler = Failing { calls: 0 };
        let res = BasinHopping::new(opts).run(&[0.5], &bounds, &mut handler);
        assert!(res.lowest.is_none());
        assert_eq!(res.accepted, 0);
        assert_eq!(res.hops, 3);
        // The last hop is worse than the best one; the best is still kept.
        assert_eq!(res.last.fun, 3.0);
        assert_eq!(res.lowest_finite.map(|r| r.fun), Some(2.0));
    }

    #[test]
    fn all_nan_results_leave_no_finite_lowest() {
        struct Nan;
        impl HopHandler for Nan {
            fn minimize(&mut self, x0: &[f64]) -> OptimizeResult {
                OptimizeResult {
                    termination: Termination::NonFinite,
                    ..OptimizeResult::interrupted(x0)
                }
            }
            fn on_hop(&mut self, _: usize, _: &OptimizeResult, _: bool) -> ControlFlow<()> {
                ControlFlow::Continue(())
            }
        }
        let bounds = [(0.0, 1.0)];
        let mut opts = options(1);
        opts.success_iterations = 2;
        let res = BasinHopping::new(opts).run(&[0.5], &bounds, &mut Nan);
        assert!(res.lowest.is_none());
        assert!(res.lowest_finite.is_none());
    }
}
