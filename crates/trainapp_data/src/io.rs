//! Reading tabular data from CSV.

use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;

use ndarray::Array2;

use crate::dataset::TabularDataset;
use crate::error::{DataError, Result};

/// How the target column of a CSV file is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetKind {
    /// String labels mapped to class indices (sorted label order).
    #[default]
    Categorical,
    /// Numeric regression target.
    Continuous,
}

/// Options for [`read_csv`].
#[derive(Debug, Clone)]
pub struct CsvOptions {
    /// Name of the target column, if the file has one.
    pub target: Option<String>,
    /// How to interpret the target column.
    pub target_kind: TargetKind,
    /// Field delimiter.
    pub delimiter: u8,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            target: None,
            target_kind: TargetKind::Categorical,
            delimiter: b',',
        }
    }
}

impl CsvOptions {
    /// Options for a file whose `column` holds class labels.
    #[must_use]
    pub fn with_class_target(column: impl Into<String>) -> Self {
        Self {
            target: Some(column.into()),
            target_kind: TargetKind::Categorical,
            ..Default::default()
        }
    }

    /// Options for a file whose `column` holds a numeric target.
    #[must_use]
    pub fn with_continuous_target(column: impl Into<String>) -> Self {
        Self {
            target: Some(column.into()),
            target_kind: TargetKind::Continuous,
            ..Default::default()
        }
    }
}

/// A dataset read from CSV together with its column metadata.
#[derive(Debug, Clone)]
pub struct CsvData {
    /// The rows as a dataset.
    pub dataset: TabularDataset,
    /// Feature column names, in order.
    pub feature_names: Vec<String>,
    /// Class labels, indexed by class id (empty for continuous targets).
    pub classes: Vec<String>,
}

/// Read a CSV file with a header row.
///
/// Every column other than the target is parsed as an `f32` feature.
pub fn read_csv<P: AsRef<Path>>(path: P, options: &CsvOptions) -> Result<CsvData> {
    let file = std::fs::File::open(path.as_ref())?;
    read_csv_from(file, options)
}

/// Read CSV data with a header row from any reader.
pub fn read_csv_from<R: Read>(reader: R, options: &CsvOptions) -> Result<CsvData> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let target_index = match &options.target {
        Some(name) => Some(
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| DataError::MissingColumn(name.clone()))?,
        ),
        None => None,
    };

    let feature_names: Vec<String> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != target_index)
        .map(|(_, h)| h.clone())
        .collect();

    let mut features: Vec<f32> = Vec::new();
    let mut raw_targets: Vec<String> = Vec::new();
    let mut n_rows = 0usize;

    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        for (i, cell) in record.iter().enumerate() {
            if Some(i) == target_index {
                raw_targets.push(cell.to_string());
            } else {
                features.push(parse_cell(cell, row + 1, &headers[i])?);
            }
        }
        n_rows += 1;
    }

    if n_rows == 0 {
        return Err(DataError::EmptyDataset);
    }

    let x = Array2::from_shape_vec((n_rows, feature_names.len()), features)
        .map_err(|e| DataError::InvalidShape(e.to_string()))?;

    let (y, classes) = match (target_index, options.target_kind) {
        (None, _) => (None, Vec::new()),
        (Some(_), TargetKind::Categorical) => {
            let classes: Vec<String> = raw_targets
                .iter()
                .cloned()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            let ids: Vec<f32> = raw_targets
                .iter()
                .map(|t| classes.iter().position(|c| c == t).unwrap_or(0) as f32)
                .collect();
            (Some(column(ids)?), classes)
        }
        (Some(i), TargetKind::Continuous) => {
            let values = raw_targets
                .iter()
                .enumerate()
                .map(|(row, t)| parse_cell(t, row + 1, &headers[i]))
                .collect::<Result<Vec<f32>>>()?;
            (Some(column(values)?), Vec::new())
        }
    };

    Ok(CsvData {
        dataset: TabularDataset::from_arrays(x, y)?,
        feature_names,
        classes,
    })
}

fn parse_cell(cell: &str, row: usize, column: &str) -> Result<f32> {
    cell.parse::<f32>().map_err(|_| DataError::Parse {
        row,
        column: column.to_string(),
        value: cell.to_string(),
    })
}

fn column(values: Vec<f32>) -> Result<Array2<f32>> {
    let n = values.len();
    Array2::from_shape_vec((n, 1), values).map_err(|e| DataError::InvalidShape(e.to_string()))
}
