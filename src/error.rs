//! Error types for mask generation

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for mask generation operations
pub type Result<T> = std::result::Result<T, MaskGenError>;

/// Error types for mask generation
#[derive(Error, Debug)]
pub enum MaskGenError {
    /// Source image missing, unreadable or not decodable
    #[error("Failed to decode image '{}': {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    /// Inference output does not reduce to the expected mask shape
    #[error("Unexpected output tensor shape {actual:?} (expected {expected:?} after removing singleton dimensions)")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Mask could not be written (permissions, missing directory, disk full)
    #[error("Failed to write mask '{}': {reason}", path.display())]
    Write { path: PathBuf, reason: String },

    /// Model loading or initialization errors
    #[error("Model error: {0}")]
    Model(String),

    /// Backend inference errors
    #[error("Inference error: {0}")]
    Inference(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Comparison report generation errors
    #[error("Report error: {0}")]
    Report(String),

    /// Input/output errors not tied to a single image
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MaskGenError {
    /// Create a new decode error for `path`
    pub fn decode<P: AsRef<Path>, S: Into<String>>(path: P, reason: S) -> Self {
        Self::Decode {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Create a new write error for `path`
    pub fn write<P: AsRef<Path>, S: Into<String>>(path: P, reason: S) -> Self {
        Self::Write {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Create a new shape mismatch error
    #[must_use]
    pub fn shape_mismatch(expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new report error
    pub fn report<S: Into<String>>(msg: S) -> Self {
        Self::Report(msg.into())
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<Path>>(operation: &str, path: P, error: &std::io::Error) -> Self {
        Self::Io(std::io::Error::new(
            error.kind(),
            format!(
                "Failed to {} '{}': {}",
                operation,
                path.as_ref().display(),
                error
            ),
        ))
    }

    /// Create model error with troubleshooting context
    pub fn model_error_with_context<P: AsRef<Path>>(
        operation: &str,
        model_path: P,
        error: &str,
        suggestions: &[&str],
    ) -> Self {
        let suggestion_text = if suggestions.is_empty() {
            String::new()
        } else {
            format!(" Suggestions: {}", suggestions.join(", "))
        };

        Self::Model(format!(
            "Failed to {} model '{}': {}.{}",
            operation,
            model_path.as_ref().display(),
            error,
            suggestion_text
        ))
    }

    /// Path of the image this error is about, if any
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Decode { path, .. } | Self::Write { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Whether this error is confined to a single image
    ///
    /// Per-image errors can be skipped under `FailurePolicy::Continue`; the rest
    /// (model, configuration) abort the batch regardless of policy.
    #[must_use]
    pub fn is_per_image(&self) -> bool {
        matches!(
            self,
            Self::Decode { .. } | Self::ShapeMismatch { .. } | Self::Write { .. } | Self::Inference(_)
        )
    }
}
