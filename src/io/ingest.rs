//! CSV ingest of grain-size datasets.
//!
//! Layout (one table per file):
//!
//! - row 1: a label cell (usually `name`), then the size classes
//! - every further row: the sample name, then its distribution
//!
//! Trailing empty cells (spreadsheet exports) are ignored, blank lines are
//! skipped. The parsed dataset is validated as a whole before it is
//! returned, so every sample in it can be fed to a resolver.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use tracing::{debug, info};

use crate::domain::{GrainSizeDataset, Normalization, SampleRecord};
use crate::error::IngestError;

/// Load and validate a dataset file.
pub fn load_dataset(path: &Path) -> Result<GrainSizeDataset, IngestError> {
    let file = File::open(path).map_err(|source| IngestError::Open {
        path: path.display().to_string(),
        source,
    })?;
    let dataset = read_dataset(file)?;
    info!(
        path = %path.display(),
        samples = dataset.samples.len(),
        classes = dataset.classes.len(),
        "dataset loaded"
    );
    Ok(dataset)
}

/// Parse and validate a dataset from any reader.
pub fn read_dataset<R: Read>(reader: R) -> Result<GrainSizeDataset, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut classes: Option<Vec<f64>> = None;
    let mut samples = Vec::new();

    for (idx, result) in reader.records().enumerate() {
        let record = result?;
        let line = record.position().map_or(idx + 1, |p| p.line() as usize);
        let cells = trimmed_cells(&record);
        if cells.is_empty() {
            continue;
        }

        if classes.is_none() {
            let values = parse_values(&cells[1..], line)?;
            if values.is_empty() {
                return Err(IngestError::Layout {
                    line,
                    message: "the first row holds no size classes".to_string(),
                });
            }
            classes = Some(values);
        } else {
            let name = cells[0].to_string();
            let distribution = parse_values(&cells[1..], line)?;
            samples.push(SampleRecord { name, distribution });
        }
    }

    let Some(classes) = classes else {
        return Err(IngestError::Layout {
            line: 1,
            message: "the file is empty".to_string(),
        });
    };
    if samples.is_empty() {
        return Err(IngestError::Layout {
            line: 2,
            message: "no sample rows after the class row".to_string(),
        });
    }

    let mut dataset = GrainSizeDataset {
        classes,
        samples,
        normalization: Normalization::Fraction,
    };
    dataset.normalization = dataset.validate()?;
    debug!(normalization = ?dataset.normalization, "dataset validated");
    Ok(dataset)
}

/// Cells of `record` with trailing empty cells dropped.
fn trimmed_cells(record: &StringRecord) -> Vec<&str> {
    let mut cells: Vec<&str> = record.iter().collect();
    while cells.last().is_some_and(|c| c.is_empty()) {
        cells.pop();
    }
    cells
}

fn parse_values(cells: &[&str], line: usize) -> Result<Vec<f64>, IngestError> {
    cells
        .iter()
        .enumerate()
        .map(|(col, cell)| {
            cell.parse::<f64>().map_err(|_| IngestError::Layout {
                line,
                message: format!("column {}: '{cell}' is not a number", col + 2),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DataRejection;

    #[test]
    fn reads_classes_and_samples() {
        let text = "name,1,2,4,8\nA,10,40,40,10\nB,0,50,50,0,,\n\n";
        let dataset = read_dataset(text.as_bytes()).unwrap();
        assert_eq!(dataset.classes, vec![1.0, 2.0, 4.0, 8.0]);
        assert_eq!(dataset.sample_names().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(dataset.normalization, Normalization::Percentage);
        assert_eq!(dataset.samples[1].distribution, vec![0.0, 50.0, 50.0, 0.0]);
    }

    #[test]
    fn rejects_non_numeric_cells() {
        let text = "name,1,2,x\nA,0.2,0.5,0.3\n";
        let err = read_dataset(text.as_bytes()).unwrap_err();
        assert!(matches!(err, IngestError::Layout { line: 1, .. }), "{err}");
    }

    #[test]
    fn rejects_mixed_units() {
        let text = "name,1,2,3\nA,0.2,0.5,0.3\nB,20,50,30\n";
        let err = read_dataset(text.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            IngestError::Dataset(DataRejection::InconsistentNormalization { ref sample }) if sample == "B"
        ));
    }

    #[test]
    fn rejects_bad_sample_length() {
        let text = "name,1,2,3\nA,0.5,0.5\n";
        let err = read_dataset(text.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            IngestError::Rejected {
                reason: DataRejection::LengthNotEqual { x_len: 3, y_len: 2 },
                ..
            }
        ));
    }

    #[test]
    fn rejects_decreasing_classes() {
        let text = "name,3,2,1\nA,0.2,0.5,0.3\n";
        let err = read_dataset(text.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            IngestError::Dataset(DataRejection::ClassesNotIncreasing { index: 1 })
        ));
    }

    #[test]
    fn header_only_file_has_no_samples() {
        let err = read_dataset("name,1,2,3\n".as_bytes()).unwrap_err();
        assert!(matches!(err, IngestError::Layout { .. }));
    }
}
