//! Model artifact discovery and metadata

use crate::error::{MaskGenError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// On-disk model formats understood by the backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    /// TensorFlow Lite flatbuffer
    TfLite,
    /// ONNX protobuf
    Onnx,
}

impl ModelFormat {
    /// Detect the model format from the file extension
    ///
    /// # Errors
    /// - Missing or unrecognized extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .as_deref()
        {
            Some("tflite") => Ok(Self::TfLite),
            Some("onnx") => Ok(Self::Onnx),
            _ => Err(MaskGenError::model_error_with_context(
                "detect format of",
                path,
                "unrecognized model extension",
                &["use a .tflite or .onnx file"],
            )),
        }
    }
}

impl std::fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TfLite => write!(f, "TFLite"),
            Self::Onnx => write!(f, "ONNX"),
        }
    }
}

/// Model information and metadata
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name: String,
    pub format: ModelFormat,
    pub size_bytes: usize,
    /// NHWC input shape
    pub input_shape: (usize, usize, usize, usize),
}

/// A model file loaded into memory, ready to hand to a backend
#[derive(Debug)]
pub struct ModelArtifact {
    path: PathBuf,
    format: ModelFormat,
    data: Vec<u8>,
}

impl ModelArtifact {
    /// Read the model at `path`
    ///
    /// # Errors
    /// - Unrecognized model extension
    /// - File missing or unreadable
    /// - Empty file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let format = ModelFormat::from_path(path)?;

        let data = fs::read(path).map_err(|e| {
            MaskGenError::model_error_with_context(
                "read",
                path,
                &e.to_string(),
                &["check the --model path", "verify file permissions"],
            )
        })?;

        if data.is_empty() {
            return Err(MaskGenError::model_error_with_context(
                "read",
                path,
                "file is empty",
                &[],
            ));
        }

        log::debug!(
            "Read {} model {} ({} bytes)",
            format,
            path.display(),
            data.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            format,
            data,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn format(&self) -> ModelFormat {
        self.format
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Describe the model for a square `input_size` RGB input
    #[must_use]
    pub fn info(&self, input_size: u32) -> ModelInfo {
        let size = input_size as usize;
        ModelInfo {
            name: self
                .path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            format: self.format,
            size_bytes: self.data.len(),
            input_shape: (1, size, size, 3),
        }
    }
}
