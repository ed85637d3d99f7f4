//! Error types for trainapp applications.

use thiserror::Error;
use trainapp_core::{CoreError, Hook};

/// Result type alias using [`AppError`].
pub type Result<T> = std::result::Result<T, AppError>;

/// Errors raised by applications, their hooks and the command line.
#[derive(Error, Debug)]
pub enum AppError {
    /// A hook was called that the application does not provide.
    #[error("{app} does not implement the '{hook}' hook")]
    NotImplemented {
        /// Application name.
        app: String,
        /// The missing hook.
        hook: Hook,
    },

    /// The application's hook declarations are malformed.
    #[error("Initialization error: {0}")]
    Initialization(String),

    /// A required file (usually pretrained weights) does not exist.
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// A hook argument has an unacceptable value.
    #[error("Invalid value for '{name}': {reason}")]
    InvalidValue {
        /// Argument name.
        name: String,
        /// What went wrong.
        reason: String,
    },

    /// A hook read a parameter that was neither passed nor defaulted.
    #[error("Missing argument '--{}'", .0.replace('_', "-"))]
    MissingArgument(String),

    /// The configuration file could not be used.
    #[error("Config error: {0}")]
    Config(String),

    /// Command-line parsing failed.
    #[error(transparent)]
    Cli(#[from] clap::Error),

    /// Core error.
    #[error("Core error: {0}")]
    Core(CoreError),

    /// Data error.
    #[error("Data error: {0}")]
    Data(#[from] trainapp_data::DataError),

    /// Training error.
    #[error("Training error: {0}")]
    Train(#[from] trainapp_train::TrainError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// A `NotImplemented` error for `hook` of the app named `app`.
    pub fn not_implemented(app: impl Into<String>, hook: Hook) -> Self {
        Self::NotImplemented {
            app: app.into(),
            hook,
        }
    }

    /// An `InvalidValue` error.
    pub fn invalid_value(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error means the application is missing something it
    /// must provide (an unimplemented hook or an absent pretrained file).
    #[must_use]
    pub fn is_configuration_missing(&self) -> bool {
        matches!(self, Self::NotImplemented { .. } | Self::FileNotFound(_))
    }
}

impl From<CoreError> for AppError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::MissingArgument(name) => Self::MissingArgument(name),
            CoreError::InvalidValue { name, reason } => Self::InvalidValue { name, reason },
            other => Self::Core(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_map_to_app_errors() {
        let err: AppError = CoreError::MissingArgument("csv_path".to_string()).into();
        assert!(matches!(err, AppError::MissingArgument(ref n) if n == "csv_path"));
        assert_eq!(err.to_string(), "Missing argument '--csv-path'");

        let err: AppError = CoreError::TypeMismatch {
            name: "lr".to_string(),
            expected: "float".to_string(),
            got: "string".to_string(),
        }
        .into();
        assert!(matches!(err, AppError::Core(_)));
    }

    #[test]
    fn test_configuration_missing() {
        assert!(AppError::not_implemented("BaseApp", Hook::Model).is_configuration_missing());
        assert!(AppError::FileNotFound("model.mpk".to_string()).is_configuration_missing());
        assert!(!AppError::invalid_value("lr", "negative").is_configuration_missing());
    }
}
