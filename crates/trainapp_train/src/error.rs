//! Error types for training.

use thiserror::Error;

/// Result type alias for training operations.
pub type Result<T> = std::result::Result<T, TrainError>;

/// Errors that can occur during training.
#[derive(Error, Debug)]
pub enum TrainError {
    /// Training or evaluation needs targets the batch does not carry.
    #[error("Missing targets: {0}")]
    MissingTargets(String),

    /// Invalid learning rate.
    #[error("Invalid learning rate: {0}")]
    InvalidLearningRate(String),

    /// Invalid trainer or fit configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The monitored metric is not produced by the learner.
    #[error("Unknown monitor '{0}': not a loss or a configured metric")]
    UnknownMonitor(String),

    /// Tensor data could not be read back to the host.
    #[error("Tensor error: {0}")]
    TensorError(String),

    /// Checkpoint error.
    #[error("Checkpoint error: {0}")]
    CheckpointError(String),

    /// Data error.
    #[error("Data error: {0}")]
    DataError(#[from] trainapp_data::DataError),

    /// Core error.
    #[error("Core error: {0}")]
    CoreError(#[from] trainapp_core::CoreError),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}
