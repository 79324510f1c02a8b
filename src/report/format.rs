//! Formatted terminal output for fits and datasets.
//!
//! We keep formatting code in one place so:
//! - the fitting code stays clean and testable
//! - output changes are localized

use crate::domain::{FitReport, GrainSizeDataset, StageOutcome};
use crate::fit::FittingWindow;

/// Format one fit: settings echo, quality, and the component table.
pub fn format_fit_report(report: &FitReport) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== grainfit: {} ===\n", report.sample_name));
    out.push_str(&format!(
        "Model: {} x{} | input unit: {:?}\n",
        report.distribution_family.display_name(),
        report.component_count,
        report.normalization,
    ));
    let (first, last) = match (report.target.x.first(), report.target.x.last()) {
        (Some(a), Some(b)) => (*a, *b),
        _ => (f64::NAN, f64::NAN),
    };
    out.push_str(&format!(
        "Window: {} classes from #{} | x=[{}, {}]\n",
        report.target.x.len(),
        report.x_offset,
        fmt_num(first),
        fmt_num(last),
    ));
    out.push_str(&format!(
        "Global: {} hops ({}) | Final: {} iterations ({})\n",
        report.global_hops,
        outcome_label(report.global_outcome),
        report.final_iterations,
        outcome_label(report.final_outcome),
    ));
    out.push_str(&format!("MSE: {:.6e}\n", report.mse));

    let (shape_name, scale_name) = report.distribution_family.parameter_names();
    out.push('\n');
    out.push_str(
        format!(
            "{:<4} {:>10} {:>10} {:>8} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10}\n",
            "", shape_name, scale_name, "weight", "mean", "median", "mode", "std", "skew", "kurt"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<4} {:-<10} {:-<10} {:-<8} {:-<10} {:-<10} {:-<10} {:-<10} {:-<10} {:-<10}\n",
            "", "", "", "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');
    for s in &report.statistics {
        out.push_str(&format!(
            "{:<4} {:>10} {:>10} {:>8.4} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10}\n",
            format!("C{}", s.index),
            fmt_num(s.shape),
            fmt_num(s.scale),
            s.weight,
            fmt_num(s.mean),
            fmt_num(s.median),
            fmt_num(s.mode),
            fmt_num(s.standard_deviation),
            fmt_num(s.skewness),
            fmt_num(s.kurtosis),
        ));
    }
    out.push_str(&format!("\nParameters: {}\n", fmt_vec(&report.parameters)));

    out
}

/// One line per sample: unit, sum, and the fitting window it would get.
pub fn format_dataset_summary(dataset: &GrainSizeDataset) -> String {
    let mut out = String::new();
    let classes = &dataset.classes;
    let (first, last) = match (classes.first(), classes.last()) {
        (Some(a), Some(b)) => (*a, *b),
        _ => (f64::NAN, f64::NAN),
    };

    out.push_str(&format!(
        "Dataset: {} samples | {} classes x=[{}, {}] | unit: {:?}\n\n",
        dataset.samples.len(),
        classes.len(),
        fmt_num(first),
        fmt_num(last),
        dataset.normalization,
    ));
    out.push_str(format!("{:<24} {:>10} {:>8} {:>8} {:>8}\n", "sample", "sum", "start", "end", "len").trim_end());
    out.push('\n');
    out.push_str(format!("{:-<24} {:-<10} {:-<8} {:-<8} {:-<8}\n", "", "", "", "", "").trim_end());
    out.push('\n');

    let divisor = dataset.normalization.divisor();
    for sample in &dataset.samples {
        let sum: f64 = sample.distribution.iter().sum();
        let fractions: Vec<f64> = sample.distribution.iter().map(|v| v / divisor).collect();
        let line = match FittingWindow::from_series(classes, &fractions) {
            Ok(w) => format!(
                "{:<24} {:>10.4} {:>8} {:>8} {:>8}",
                truncate(&sample.name, 24),
                sum,
                w.start_index,
                w.end_index,
                w.len()
            ),
            Err(reason) => format!("{:<24} {:>10.4} {reason}", truncate(&sample.name, 24), sum),
        };
        out.push_str(line.trim_end());
        out.push('\n');
    }

    out
}

fn outcome_label(outcome: StageOutcome) -> &'static str {
    match outcome {
        StageOutcome::Converged => "converged",
        StageOutcome::AcceptableLimit => "iteration limit",
    }
}

fn fmt_num(v: f64) -> String {
    if v.is_finite() { format!("{v:.4}") } else { "-".to_string() }
}

fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.6}")).collect();
    format!("[{}]", parts.join(", "))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Normalization, SampleRecord};

    #[test]
    fn dataset_summary_lists_windows() {
        let dataset = GrainSizeDataset {
            classes: vec![1.0, 2.0, 3.0, 4.0, 5.0],
            samples: vec![
                SampleRecord {
                    name: "A".to_string(),
                    distribution: vec![0.0, 0.0, 0.5, 0.5, 0.0],
                },
                SampleRecord {
                    name: "B".to_string(),
                    distribution: vec![0.0, 0.0, 1.0, 0.0, 0.0],
                },
            ],
            normalization: Normalization::Fraction,
        };
        let text = format_dataset_summary(&dataset);
        let rows: Vec<&str> = text.lines().skip(4).collect();
        assert!(rows[0].starts_with("A"));
        assert!(rows[0].ends_with("1        5        4"), "{}", rows[0]);
        // B trims to three classes around its single positive value.
        assert!(rows[1].ends_with("1        4        3"), "{}", rows[1]);
    }

    #[test]
    fn truncate_marks_cut_names() {
        assert_eq!(truncate("abcdef", 4), "abc.");
        assert_eq!(truncate("abc", 4), "abc");
        assert_eq!(fmt_num(f64::NAN), "-");
    }
}
