//! Export fit reports to JSON and per-component statistics to CSV.
//!
//! The JSON file is a full `ReportFile` (settings plus every series) for
//! downstream scripts; the CSV is one row per component for spreadsheets.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::Utc;
use serde::Serialize;

use crate::domain::{FitReport, FitSettings, ReportFile};
use crate::error::{AppError, exit};

/// Write every report, wrapped in a `ReportFile` envelope.
pub fn write_report_json(path: &Path, settings: &FitSettings, reports: &[FitReport]) -> Result<(), AppError> {
    let envelope = ReportFile {
        tool: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        generated_at: Utc::now(),
        settings: settings.clone(),
        reports: reports.to_vec(),
    };
    let file = File::create(path).map_err(|e| {
        AppError::new(exit::USAGE, format!("Failed to create report JSON '{}': {e}", path.display()))
    })?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &envelope)
        .map_err(|e| AppError::new(exit::USAGE, format!("Failed to write report JSON: {e}")))?;
    writer
        .flush()
        .map_err(|e| AppError::new(exit::USAGE, format!("Failed to write report JSON: {e}")))?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct StatisticsRow<'a> {
    sample: &'a str,
    family: &'static str,
    component: String,
    shape: f64,
    scale: f64,
    weight: f64,
    mean: Option<f64>,
    median: Option<f64>,
    mode: Option<f64>,
    variance: Option<f64>,
    standard_deviation: Option<f64>,
    skewness: Option<f64>,
    kurtosis: Option<f64>,
    mse: f64,
}

/// Undefined statistics become empty cells.
fn cell(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

/// Write one row per fitted component.
pub fn write_statistics_csv(path: &Path, reports: &[FitReport]) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::new(exit::USAGE, format!("Failed to create statistics CSV '{}': {e}", path.display()))
    })?;
    write_statistics(file, reports)
        .map_err(|e| AppError::new(exit::USAGE, format!("Failed to write statistics CSV: {e}")))
}

fn write_statistics<W: Write>(out: W, reports: &[FitReport]) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(out);
    for report in reports {
        for s in &report.statistics {
            writer.serialize(StatisticsRow {
                sample: &report.sample_name,
                family: report.distribution_family.display_name(),
                component: format!("C{}", s.index),
                shape: s.shape,
                scale: s.scale,
                weight: s.weight,
                mean: cell(s.mean),
                median: cell(s.median),
                mode: cell(s.mode),
                variance: cell(s.variance),
                standard_deviation: cell(s.standard_deviation),
                skewness: cell(s.skewness),
                kurtosis: cell(s.kurtosis),
                mse: report.mse,
            })?;
        }
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ComponentStatistics, DistributionFamily, Normalization, Series, StageOutcome,
    };

    fn report() -> FitReport {
        let series = Series {
            x: vec![1.0, 2.0],
            y: vec![0.5, 0.5],
        };
        FitReport {
            sample_name: "S1".to_string(),
            distribution_family: DistributionFamily::Weibull,
            component_count: 1,
            normalization: Normalization::Fraction,
            target: series.clone(),
            fitted_sum: series.clone(),
            components: vec![series],
            mse: 0.0,
            x_offset: 1,
            parameters: vec![1.0, 2.0, 1.0],
            global_outcome: StageOutcome::Converged,
            final_outcome: StageOutcome::AcceptableLimit,
            global_hops: 4,
            final_iterations: 1000,
            statistics: vec![ComponentStatistics {
                index: 1,
                shape: 1.0,
                scale: 2.0,
                weight: 1.0,
                mean: 1.5,
                median: 1.4,
                mode: f64::NAN,
                variance: 4.0,
                standard_deviation: 2.0,
                skewness: 2.0,
                kurtosis: 6.0,
            }],
        }
    }

    #[test]
    fn statistics_csv_leaves_undefined_cells_empty() {
        let mut buf = Vec::new();
        write_statistics(&mut buf, &[report()]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "sample,family,component,shape,scale,weight,mean,median,mode,variance,standard_deviation,skewness,kurtosis,mse"
        );
        assert_eq!(lines.next().unwrap(), "S1,Weibull,C1,1.0,2.0,1.0,1.5,1.4,,4.0,2.0,2.0,6.0,0.0");
    }

    #[test]
    fn report_json_serializes_nan_as_null() {
        let json = serde_json::to_value(report()).unwrap();
        assert!(json["statistics"][0]["mode"].is_null());
        assert_eq!(json["final_outcome"], "acceptable_limit");
        assert_eq!(json["distribution_family"], "weibull");
    }
}
