//! Error types for rendering operations

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while driving an external rendering engine
#[derive(Error, Debug)]
pub enum RenderError {
    /// No engine could be reached, or the engine binary could not be started
    #[error("Rendering engine unavailable: {0}")]
    EngineUnavailable(String),

    /// The engine ran past its deadline and was killed
    #[error("{engine} did not finish within {}s", .timeout.as_secs_f32())]
    ConversionTimeout { engine: String, timeout: Duration },

    /// The engine exited unsuccessfully or produced no output
    #[error("{engine} conversion failed: {message}")]
    ConversionFailed {
        engine: String,
        message: String,
        /// Captured standard error of the engine process
        stderr: String,
    },

    /// The job was cancelled by the caller
    #[error("Conversion cancelled")]
    Cancelled,

    /// The input document does not exist or is not a file
    #[error("Invalid input document: {}", .0.display())]
    InvalidInput(PathBuf),

    /// Unsupported output format
    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    /// Whether the failure is caused by what the caller passed in
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            RenderError::InvalidInput(_) | RenderError::UnsupportedFormat(_)
        )
    }

    /// Whether running the same job again could succeed
    ///
    /// Timeouts and unreachable engines are transient. An engine that ran to
    /// completion and failed will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RenderError::ConversionTimeout { .. } | RenderError::EngineUnavailable(_)
        )
    }
}

/// Result type for rendering operations
pub type Result<T> = std::result::Result<T, RenderError>;
