//! Configuration types for mask generation runs

use crate::error::{MaskGenError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default location of the segmentation model artifact
pub const DEFAULT_MODEL_PATH: &str = "fairscan-segmentation-model.tflite";

/// Default dataset root containing `images/` and `masks/`
pub const DEFAULT_DATASET_DIR: &str = "dataset";

/// Default file name pattern for input images
pub const DEFAULT_IMAGE_PATTERN: &str = "*.jpg";

/// Square input resolution expected by the segmentation model
pub const MODEL_INPUT_SIZE: u32 = 256;

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    #[default]
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon GPU acceleration
    CoreMl,
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

impl std::str::FromStr for ExecutionProvider {
    type Err = MaskGenError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda),
            "coreml" => Ok(Self::CoreMl),
            other => Err(MaskGenError::invalid_config(format!(
                "Unknown execution provider '{other}' (expected auto, cpu, cuda or coreml)"
            ))),
        }
    }
}

/// Inference backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendType {
    /// Tract, pure Rust (reads `.tflite` and `.onnx`)
    #[default]
    Tract,
    /// ONNX Runtime (supports GPU acceleration)
    Onnx,
    /// Synthetic backend, no model file required
    Mock,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tract => write!(f, "tract"),
            Self::Onnx => write!(f, "onnx"),
            Self::Mock => write!(f, "mock"),
        }
    }
}

impl BackendType {
    /// Parse a `backend[:provider]` string such as `onnx:cuda` or `tract`
    ///
    /// A missing provider means `auto` for ONNX Runtime and `cpu` for the others.
    ///
    /// # Errors
    /// - Unknown backend or provider names
    /// - Providers other than `cpu` requested for Tract or the mock backend
    pub fn parse_provider_string(value: &str) -> Result<(Self, ExecutionProvider)> {
        let (backend, provider) = match value.split_once(':') {
            Some((backend, provider)) => (backend, Some(provider)),
            None => (value, None),
        };

        let backend_type = match backend.to_lowercase().as_str() {
            "tract" => Self::Tract,
            "onnx" => Self::Onnx,
            "mock" => Self::Mock,
            other => {
                return Err(MaskGenError::invalid_config(format!(
                    "Unknown backend '{other}' (expected tract, onnx or mock)"
                )))
            },
        };

        let provider = match (backend_type, provider) {
            (Self::Onnx, None) => ExecutionProvider::Auto,
            (_, None) => ExecutionProvider::Cpu,
            (_, Some(p)) => p.parse()?,
        };

        if backend_type != Self::Onnx && provider != ExecutionProvider::Cpu {
            return Err(MaskGenError::invalid_config(format!(
                "Backend '{backend_type}' only supports the cpu provider, got '{provider}'"
            )));
        }

        Ok((backend_type, provider))
    }
}

/// Lossless output format for mask images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MaskFormat {
    #[default]
    Png,
    Tiff,
}

impl MaskFormat {
    /// File extension written for this format
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Tiff => "tiff",
        }
    }

    #[must_use]
    pub fn image_format(self) -> image::ImageFormat {
        match self {
            Self::Png => image::ImageFormat::Png,
            Self::Tiff => image::ImageFormat::Tiff,
        }
    }
}

/// Rounding rule used when quantizing mask probabilities to 8 bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoundingMode {
    /// Banker's rounding, matching numpy's `round`
    #[default]
    HalfToEven,
    /// Ties rounded away from zero, matching `f32::round`
    HalfAwayFromZero,
}

/// What the driver does when a single image fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Log the failure, continue with the next image, report at the end
    #[default]
    Continue,
    /// Abort the whole run on the first failure
    FailFast,
}

/// Configuration for a mask generation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MaskGenConfig {
    /// Location of the inference artifact (`.tflite` or `.onnx`)
    pub model_path: PathBuf,
    /// Dataset root containing `images/` and `masks/`
    pub dataset_dir: PathBuf,
    /// Overrides `<dataset_dir>/images`
    pub images_dir: Option<PathBuf>,
    /// Overrides `<dataset_dir>/masks`
    pub masks_dir: Option<PathBuf>,
    /// Glob matched against input file names
    pub image_pattern: String,
    pub mask_format: MaskFormat,
    pub backend_type: BackendType,
    pub execution_provider: ExecutionProvider,
    /// Number of intra-op threads (0 = auto)
    pub intra_threads: usize,
    /// Square model input resolution
    pub input_size: u32,
    pub rounding: RoundingMode,
    pub failure_policy: FailurePolicy,
}

impl Default for MaskGenConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            dataset_dir: PathBuf::from(DEFAULT_DATASET_DIR),
            images_dir: None,
            masks_dir: None,
            image_pattern: DEFAULT_IMAGE_PATTERN.to_string(),
            mask_format: MaskFormat::default(),
            backend_type: BackendType::default(),
            execution_provider: ExecutionProvider::Cpu,
            intra_threads: 0,
            input_size: MODEL_INPUT_SIZE,
            rounding: RoundingMode::default(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl MaskGenConfig {
    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> MaskGenConfigBuilder {
        MaskGenConfigBuilder::default()
    }

    /// Load a configuration from a JSON file; missing fields take their defaults
    ///
    /// # Errors
    /// - File cannot be read
    /// - JSON is malformed or contains unknown fields
    /// - Resulting configuration fails validation
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| MaskGenError::file_io_error("read config file", path, &e))?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            MaskGenError::invalid_config(format!("{}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Directory scanned for input images
    #[must_use]
    pub fn images_dir(&self) -> PathBuf {
        self.images_dir
            .clone()
            .unwrap_or_else(|| self.dataset_dir.join("images"))
    }

    /// Directory receiving generated masks
    #[must_use]
    pub fn masks_dir(&self) -> PathBuf {
        self.masks_dir
            .clone()
            .unwrap_or_else(|| self.dataset_dir.join("masks"))
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// - Empty or invalid glob pattern
    /// - Zero input size
    /// - Empty model path for a backend that needs one
    /// - A GPU provider requested for a CPU-only backend
    pub fn validate(&self) -> Result<()> {
        if self.image_pattern.is_empty() {
            return Err(MaskGenError::invalid_config("Image pattern must not be empty"));
        }
        glob::Pattern::new(&self.image_pattern).map_err(|e| {
            MaskGenError::invalid_config(format!(
                "Invalid image pattern '{}': {e}",
                self.image_pattern
            ))
        })?;

        if self.input_size == 0 {
            return Err(MaskGenError::invalid_config("Input size must be positive"));
        }

        if self.backend_type != BackendType::Mock && self.model_path.as_os_str().is_empty() {
            return Err(MaskGenError::invalid_config("Model path must not be empty"));
        }

        if self.backend_type != BackendType::Onnx
            && self.execution_provider != ExecutionProvider::Cpu
        {
            return Err(MaskGenError::invalid_config(format!(
                "Backend '{}' only supports the cpu provider, got '{}'",
                self.backend_type, self.execution_provider
            )));
        }

        Ok(())
    }
}

/// Builder for `MaskGenConfig`
#[derive(Debug, Default)]
pub struct MaskGenConfigBuilder {
    config: MaskGenConfig,
}

impl MaskGenConfigBuilder {
    /// Start from an existing configuration
    #[must_use]
    pub fn from_config(config: MaskGenConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn model_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.model_path = path.into();
        self
    }

    #[must_use]
    pub fn dataset_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.dataset_dir = dir.into();
        self
    }

    #[must_use]
    pub fn images_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.images_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn masks_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.masks_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn image_pattern<S: Into<String>>(mut self, pattern: S) -> Self {
        self.config.image_pattern = pattern.into();
        self
    }

    #[must_use]
    pub fn mask_format(mut self, format: MaskFormat) -> Self {
        self.config.mask_format = format;
        self
    }

    /// Set the backend; the provider is reset to that backend's default
    #[must_use]
    pub fn backend_type(mut self, backend_type: BackendType) -> Self {
        self.config.backend_type = backend_type;
        self.config.execution_provider = match backend_type {
            BackendType::Onnx => ExecutionProvider::Auto,
            BackendType::Tract | BackendType::Mock => ExecutionProvider::Cpu,
        };
        self
    }

    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.execution_provider = provider;
        self
    }

    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self
    }

    #[must_use]
    pub fn input_size(mut self, size: u32) -> Self {
        self.config.input_size = size;
        self
    }

    #[must_use]
    pub fn rounding(mut self, rounding: RoundingMode) -> Self {
        self.config.rounding = rounding;
        self
    }

    #[must_use]
    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// - Any `MaskGenConfig::validate` failure
    pub fn build(self) -> Result<MaskGenConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_layout_follows_dataset_dir() {
        let config = MaskGenConfig::builder()
            .dataset_dir("/data/eval")
            .build()
            .unwrap();
        assert_eq!(config.images_dir(), PathBuf::from("/data/eval/images"));
        assert_eq!(config.masks_dir(), PathBuf::from("/data/eval/masks"));
        assert_eq!(config.image_pattern, "*.jpg");
        assert_eq!(config.input_size, 256);
    }

    #[test]
    fn test_explicit_dirs_override_dataset() {
        let config = MaskGenConfig::builder()
            .dataset_dir("/data/eval")
            .images_dir("/elsewhere/in")
            .masks_dir("/elsewhere/out")
            .build()
            .unwrap();
        assert_eq!(config.images_dir(), PathBuf::from("/elsewhere/in"));
        assert_eq!(config.masks_dir(), PathBuf::from("/elsewhere/out"));
    }

    #[test]
    fn test_parse_provider_string() {
        assert_eq!(
            BackendType::parse_provider_string("onnx").unwrap(),
            (BackendType::Onnx, ExecutionProvider::Auto)
        );
        assert_eq!(
            BackendType::parse_provider_string("onnx:cuda").unwrap(),
            (BackendType::Onnx, ExecutionProvider::Cuda)
        );
        assert_eq!(
            BackendType::parse_provider_string("tract").unwrap(),
            (BackendType::Tract, ExecutionProvider::Cpu)
        );
        assert_eq!(
            BackendType::parse_provider_string("TRACT:cpu").unwrap(),
            (BackendType::Tract, ExecutionProvider::Cpu)
        );
        assert!(BackendType::parse_provider_string("tract:cuda").is_err());
        assert!(BackendType::parse_provider_string("tensorflow").is_err());
        assert!(BackendType::parse_provider_string("onnx:tpu").is_err());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(MaskGenConfig::builder().image_pattern("").build().is_err());
        assert!(MaskGenConfig::builder().image_pattern("[").build().is_err());
        assert!(MaskGenConfig::builder().input_size(0).build().is_err());
        assert!(MaskGenConfig::builder().model_path("").build().is_err());
        assert!(MaskGenConfig::builder()
            .execution_provider(ExecutionProvider::Cuda)
            .build()
            .is_err());
    }

    #[test]
    fn test_mock_backend_needs_no_model() {
        let config = MaskGenConfig::builder()
            .backend_type(BackendType::Mock)
            .model_path("")
            .build();
        assert!(config.is_ok());
    }

    #[test]
    fn test_backend_type_resets_provider() {
        let config = MaskGenConfig::builder()
            .backend_type(BackendType::Onnx)
            .build()
            .unwrap();
        assert_eq!(config.execution_provider, ExecutionProvider::Auto);
    }

    #[test]
    fn test_mask_format_extension() {
        assert_eq!(MaskFormat::Png.extension(), "png");
        assert_eq!(MaskFormat::Tiff.extension(), "tiff");
        assert_eq!(MaskFormat::Png.image_format(), image::ImageFormat::Png);
    }

    #[test]
    fn test_json_file_partial_override() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("maskgen.json");
        std::fs::write(
            &path,
            r#"{ "dataset_dir": "/data/v2", "rounding": "half-away-from-zero", "failure_policy": "fail-fast" }"#,
        )
        .unwrap();

        let config = MaskGenConfig::from_json_file(&path).unwrap();
        assert_eq!(config.dataset_dir, PathBuf::from("/data/v2"));
        assert_eq!(config.rounding, RoundingMode::HalfAwayFromZero);
        assert_eq!(config.failure_policy, FailurePolicy::FailFast);
        assert_eq!(config.model_path, PathBuf::from(DEFAULT_MODEL_PATH));
    }

    #[test]
    fn test_json_file_rejects_unknown_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("maskgen.json");
        std::fs::write(&path, r#"{ "modle_path": "typo.tflite" }"#).unwrap();

        let err = MaskGenConfig::from_json_file(&path).unwrap_err();
        assert!(matches!(err, MaskGenError::InvalidConfig(_)));
    }

    #[test]
    fn test_json_file_missing() {
        let err = MaskGenConfig::from_json_file("/nonexistent/maskgen.json").unwrap_err();
        assert!(matches!(err, MaskGenError::Io(_)));
    }
}
