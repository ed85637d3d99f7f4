//! Error types for trainapp_data.

use thiserror::Error;

/// Result type alias using [`DataError`].
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur in data operations.
#[derive(Error, Debug)]
pub enum DataError {
    /// Invalid data shape.
    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    /// Empty dataset.
    #[error("Dataset is empty")]
    EmptyDataset,

    /// Index out of bounds.
    #[error("Index {index} out of bounds for length {length}")]
    IndexOutOfBounds {
        /// The requested index.
        index: usize,
        /// The length of the collection.
        length: usize,
    },

    /// Batch size error.
    #[error("Invalid batch size: {0}")]
    InvalidBatchSize(String),

    /// Split error.
    #[error("Split error: {0}")]
    SplitError(String),

    /// A CSV file could not be read or interpreted.
    #[error("CSV error: {0}")]
    Csv(String),

    /// A column named in the options is not in the file.
    #[error("Column '{0}' not found")]
    MissingColumn(String),

    /// A cell could not be parsed as a number.
    #[error("Row {row}, column '{column}': cannot parse '{value}' as a number")]
    Parse {
        /// 1-based data row.
        row: usize,
        /// Column name.
        column: String,
        /// Offending text.
        value: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<csv::Error> for DataError {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e.to_string())
    }
}
