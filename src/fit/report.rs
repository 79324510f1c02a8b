//! Turning a solved parameter vector into a `FitReport`.

use crate::domain::{ComponentStatistics, FitReport, Normalization, Series, StageOutcome};
use crate::error::FitError;
use crate::fit::window::FittingWindow;
use crate::math::MonotoneMap;
use crate::models::{MixtureModel, PARAMS_PER_COMPONENT};

/// Solver bookkeeping carried into the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageSummary {
    pub global_outcome: StageOutcome,
    pub final_outcome: StageOutcome,
    pub global_hops: usize,
    pub final_iterations: usize,
}

/// Build the report for `params` fitted over `window`.
///
/// Components are reordered by ascending mean (fitting space) so that `C1`
/// is always the finest component.
pub fn derive_fit_report(
    sample_name: &str,
    model: &MixtureModel,
    normalization: Normalization,
    window: &FittingWindow,
    params: &[f64],
    summary: StageSummary,
) -> Result<FitReport, FitError> {
    if params.len() != model.param_len() {
        return Err(FitError::Exception(format!(
            "parameter vector has {} entries, expected {}",
            params.len(),
            model.param_len()
        )));
    }
    let to_physical = MonotoneMap::new(window.fit_x.clone(), window.real_x.clone())
        .ok_or_else(|| FitError::Exception("class layout cannot be interpolated".to_string()))?;

    let mut order: Vec<(usize, f64)> = model
        .unpack(params)
        .iter()
        .enumerate()
        .map(|(i, c)| (i, model.statistics(c.shape, c.scale).mean))
        .collect();
    order.sort_by(|a, b| a.1.total_cmp(&b.1));

    let parameters: Vec<f64> = order
        .iter()
        .flat_map(|&(i, _)| params[i * PARAMS_PER_COMPONENT..(i + 1) * PARAMS_PER_COMPONENT].to_vec())
        .collect();

    let components: Vec<Series> = model
        .unpack(&parameters)
        .iter()
        .map(|c| Series {
            x: window.real_x.clone(),
            y: window
                .fit_x
                .iter()
                .map(|&x| c.weight * model.single_density(x, c.shape, c.scale))
                .collect(),
        })
        .collect();

    let fitted: Vec<f64> = window
        .fit_x
        .iter()
        .map(|&x| model.mixed_density(x, &parameters))
        .collect();
    if fitted.iter().any(|v| !v.is_finite()) {
        return Err(FitError::Exception("fitted distribution is not finite".to_string()));
    }
    let mse = fitted
        .iter()
        .zip(window.fit_y.iter())
        .map(|(f, y)| (f - y).powi(2))
        .sum::<f64>()
        / window.len() as f64;

    let statistics = model
        .unpack(&parameters)
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let m = model.statistics(c.shape, c.scale);
            ComponentStatistics {
                index: i + 1,
                shape: c.shape,
                scale: c.scale,
                weight: c.weight,
                mean: to_physical.eval_or_nan(m.mean),
                median: to_physical.eval_or_nan(m.median),
                mode: to_physical.eval_or_nan(m.mode),
                variance: m.variance,
                standard_deviation: m.standard_deviation,
                skewness: m.skewness,
                kurtosis: m.kurtosis,
            }
        })
        .collect();

    Ok(FitReport {
        sample_name: sample_name.to_string(),
        distribution_family: model.family(),
        component_count: model.component_count(),
        normalization,
        target: Series {
            x: window.real_x.clone(),
            y: window.fit_y.clone(),
        },
        fitted_sum: Series {
            x: window.real_x.clone(),
            y: fitted,
        },
        components,
        mse,
        x_offset: window.x_offset(),
        parameters,
        global_outcome: summary.global_outcome,
        final_outcome: summary.final_outcome,
        global_hops: summary.global_hops,
        final_iterations: summary.final_iterations,
        statistics,
    })
}
