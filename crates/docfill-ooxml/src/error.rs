//! Error types for package and substitution operations

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while filling a document package
#[derive(Error, Debug)]
pub enum FillError {
    /// The container could not be opened as a zip archive
    #[error("Corrupt archive {path}: {source}")]
    CorruptArchive {
        path: String,
        #[source]
        source: zip::result::ZipError,
    },

    /// An entry path escapes the scratch directory
    #[error("Archive entry escapes the package root: {0}")]
    PathTraversal(String),

    /// Writing an entry to the scratch directory failed
    #[error("Failed to extract entry {entry}: {source}")]
    ExtractionFailed {
        entry: String,
        #[source]
        source: std::io::Error,
    },

    /// Writing the package back into a zip stream failed
    #[error("Failed to repackage {path}: {message}")]
    RepackageFailed { path: PathBuf, message: String },

    /// The split-run splice loop did not converge
    #[error("Placeholder {token} did not converge after {iterations} splices")]
    UnresolvableFragmentedPlaceholder { token: String, iterations: usize },

    /// Required part not found in the package
    #[error("Required part not found: {0}")]
    MissingPart(String),

    /// A markup part is not valid UTF-8
    #[error("Part {part} is not valid UTF-8: {source}")]
    InvalidEncoding {
        part: String,
        #[source]
        source: std::string::FromUtf8Error,
    },

    /// Delimiters that cannot delimit anything
    #[error("Invalid placeholder delimiters: {0}")]
    InvalidDelimiters(String),

    /// Error reading or writing files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FillError {
    /// True when the failure is caused by the caller's input (bad archive,
    /// malicious entry paths) rather than the environment.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            FillError::CorruptArchive { .. }
                | FillError::PathTraversal(_)
                | FillError::MissingPart(_)
                | FillError::InvalidEncoding { .. }
                | FillError::InvalidDelimiters(_)
                | FillError::UnresolvableFragmentedPlaceholder { .. }
                | FillError::Json(_)
        )
    }
}

/// Result type for fill operations
pub type Result<T> = std::result::Result<T, FillError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_errors() {
        assert!(FillError::PathTraversal("../evil".into()).is_caller_error());
        assert!(FillError::MissingPart("word/document.xml".into()).is_caller_error());

        let io = FillError::ExtractionFailed {
            entry: "word/document.xml".into(),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        assert!(!io.is_caller_error());
    }

    #[test]
    fn test_error_display() {
        let err = FillError::PathTraversal("../../etc/passwd".into());
        assert_eq!(
            err.to_string(),
            "Archive entry escapes the package root: ../../etc/passwd"
        );
    }
}
