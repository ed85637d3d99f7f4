//! Error types for trainapp_core.

use thiserror::Error;

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while describing or reading hook parameters.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A hook argument was requested that the hook never received.
    #[error("Missing argument '{0}'")]
    MissingArgument(String),

    /// A hook argument holds a value of a different kind than requested.
    #[error("Argument '{name}' is {got}, expected {expected}")]
    TypeMismatch {
        /// Argument name.
        name: String,
        /// Requested kind.
        expected: String,
        /// Stored kind.
        got: String,
    },

    /// A value could not be converted for an argument (overflow, sign, bad text).
    #[error("Invalid value for '{name}': {reason}")]
    InvalidValue {
        /// Argument name.
        name: String,
        /// What went wrong.
        reason: String,
    },

    /// A parameter descriptor is malformed.
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParam {
        /// Parameter name.
        name: String,
        /// What went wrong.
        reason: String,
    },
}
