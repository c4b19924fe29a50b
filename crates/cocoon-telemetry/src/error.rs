//! Error types for telemetry.

use thiserror::Error;

/// Errors raised while installing or adjusting the log pipeline.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A level or filter directive could not be parsed.
    #[error("Invalid log filter: {0}")]
    ConfigError(String),

    /// A global subscriber is already installed.
    #[error("Logging already initialized: {0}")]
    InitError(String),

    /// The live filter could not be swapped (subscriber dropped).
    #[error("Failed to change log level: {0}")]
    ReloadError(String),

    /// Writing buffered records to a newly attached sink failed.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
