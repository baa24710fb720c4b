//! ONNX Runtime backend implementation for segmentation models
//!
//! Runs `.onnx` models through ONNX Runtime with support for multiple execution
//! providers (CPU, CUDA, CoreML).

use crate::config::{ExecutionProvider, MaskGenConfig};
use crate::error::{MaskGenError, Result};
use crate::inference::InferenceBackend;
use crate::models::{ModelArtifact, ModelFormat, ModelInfo};
use log;
use ndarray::{Array4, ArrayD};
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
};
use ort::session::{builder::GraphOptimizationLevel, builder::SessionBuilder, Session};
use ort::{self, value::Value};

// Use instant crate for cross-platform time compatibility
use instant::{Duration, Instant};

/// ONNX Runtime backend for running segmentation models
#[derive(Debug)]
pub struct OnnxBackend {
    session: Option<Session>,
    model_info: Option<ModelInfo>,
    input_size: usize,
}

impl OnnxBackend {
    /// List all ONNX Runtime execution providers with availability status and descriptions
    ///
    /// Returns `(name, available, description)` tuples.
    ///
    /// # Examples
    /// ```rust,no_run
    /// use maskgen::backends::OnnxBackend;
    ///
    /// for (name, available, description) in OnnxBackend::list_providers() {
    ///     println!("{name}: {available} - {description}");
    /// }
    /// ```
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool, String)> {
        log::debug!("Platform: {}/{}", std::env::consts::OS, std::env::consts::ARCH);

        let cuda_available =
            OrtExecutionProvider::is_available(&CUDAExecutionProvider::default()).unwrap_or(false);
        let coreml_available =
            OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default())
                .unwrap_or(false);

        vec![
            (
                "CPU".to_string(),
                true,
                "Always available, uses CPU for inference".to_string(),
            ),
            (
                "CUDA".to_string(),
                cuda_available,
                "NVIDIA GPU acceleration (requires CUDA toolkit and compatible GPU)".to_string(),
            ),
            (
                "CoreML".to_string(),
                coreml_available,
                "Apple Silicon GPU acceleration (macOS only)".to_string(),
            ),
        ]
    }

    /// Create a new uninitialized ONNX backend
    #[must_use]
    pub fn new() -> Self {
        Self {
            session: None,
            model_info: None,
            input_size: crate::config::MODEL_INPUT_SIZE as usize,
        }
    }

    fn configure_providers(
        session_builder: SessionBuilder,
        provider: ExecutionProvider,
    ) -> Result<SessionBuilder> {
        let cuda_provider = CUDAExecutionProvider::default();
        let coreml_provider = CoreMLExecutionProvider::default().with_subgraphs(true);
        let cuda_available = OrtExecutionProvider::is_available(&cuda_provider).unwrap_or(false);
        let coreml_available =
            OrtExecutionProvider::is_available(&coreml_provider).unwrap_or(false);

        let providers = match provider {
            ExecutionProvider::Cpu => {
                log::info!("Using CPU execution provider");
                Vec::new()
            },
            ExecutionProvider::Auto => {
                // CUDA > CoreML > CPU
                let mut providers = Vec::new();
                if cuda_available {
                    log::info!("CUDA execution provider is available and will be used");
                    providers.push(cuda_provider.build());
                }
                if coreml_available {
                    log::info!("CoreML execution provider is available and will be used");
                    providers.push(coreml_provider.build());
                }
                if providers.is_empty() {
                    log::warn!("No hardware acceleration available, falling back to CPU");
                }
                providers
            },
            ExecutionProvider::Cuda => {
                if cuda_available {
                    log::info!("Using CUDA execution provider");
                    vec![cuda_provider.build()]
                } else {
                    log::warn!(
                        "CUDA execution provider requested but not available, falling back to CPU"
                    );
                    Vec::new()
                }
            },
            ExecutionProvider::CoreMl => {
                if coreml_available {
                    log::info!("Using CoreML execution provider");
                    vec![coreml_provider.build()]
                } else {
                    log::warn!(
                        "CoreML execution provider requested but not available, falling back to CPU"
                    );
                    Vec::new()
                }
            },
        };

        if providers.is_empty() {
            return Ok(session_builder);
        }

        session_builder
            .with_execution_providers(providers)
            .map_err(|e| MaskGenError::model(format!("Failed to set execution providers: {e}")))
    }

    /// Load and initialize the ONNX model
    fn load_model(&mut self, config: &MaskGenConfig) -> Result<Duration> {
        let model_load_start = Instant::now();

        let artifact = ModelArtifact::load(&config.model_path)?;
        if artifact.format() != ModelFormat::Onnx {
            return Err(MaskGenError::model_error_with_context(
                "load",
                artifact.path(),
                &format!("ONNX Runtime cannot run {} models", artifact.format()),
                &["use the tract backend for .tflite models"],
            ));
        }
        let info = artifact.info(config.input_size);
        self.input_size = config.input_size as usize;

        let session_builder = Session::builder()
            .map_err(|e| MaskGenError::model(format!("Failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| MaskGenError::model(format!("Failed to set optimization level: {e}")))?;

        let session_builder =
            Self::configure_providers(session_builder, config.execution_provider)?;

        // 0 means one thread per available core
        let intra_threads = if config.intra_threads > 0 {
            config.intra_threads
        } else {
            std::thread::available_parallelism()
                .map(std::num::NonZero::get)
                .unwrap_or(4)
        };

        let session = session_builder
            .with_intra_threads(intra_threads)
            .map_err(|e| MaskGenError::model(format!("Failed to set intra threads: {e}")))?
            .commit_from_memory(artifact.data())
            .map_err(|e| {
                MaskGenError::model(format!("Failed to create session from model data: {e}"))
            })?;

        log::debug!("ONNX Runtime session created");
        log::debug!("  - Requested provider: {}", config.execution_provider);
        log::debug!("  - Threading: {intra_threads} intra-op threads");
        log::debug!("  - Model: {} ({})", info.name, info.format);
        #[allow(clippy::cast_precision_loss)] // Precision loss acceptable for logging display
        let size_mb = info.size_bytes as f64 / (1024.0 * 1024.0);
        log::debug!("  - Model size: {size_mb:.2} MB");

        self.session = Some(session);
        self.model_info = Some(info);

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "Model loading complete: {:.0}ms",
            model_load_time.as_secs_f64() * 1000.0
        );

        Ok(model_load_time)
    }
}

impl Default for OnnxBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for OnnxBackend {
    fn initialize(&mut self, config: &MaskGenConfig) -> Result<Option<Duration>> {
        if self.session.is_some() {
            return Ok(None);
        }

        let model_load_time = self.load_model(config)?;
        Ok(Some(model_load_time))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<ArrayD<f32>> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| MaskGenError::inference("ONNX session not initialized"))?;

        let inference_start = Instant::now();
        log::debug!("Starting inference with input shape: {:?}", input.dim());

        let input_value = Value::from_array(input.clone()).map_err(|e| {
            MaskGenError::inference(format!("Failed to convert input tensor: {e}"))
        })?;

        // Positional inputs, so the model's tensor names do not matter
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| MaskGenError::inference(format!("ONNX inference failed: {e}")))?;

        let output = {
            let keys: Vec<_> = outputs.keys().collect();
            let first_key = keys
                .first()
                .ok_or_else(|| MaskGenError::inference("No output tensors found"))?;
            outputs
                .get(first_key)
                .ok_or_else(|| MaskGenError::inference("First output tensor not found"))?
                .try_extract_array::<f32>()
                .map_err(|e| {
                    MaskGenError::inference(format!("Failed to extract output tensor: {e}"))
                })?
                .to_owned()
        };

        log::debug!(
            "Inference complete: {:.2}ms, output {:?}",
            inference_start.elapsed().as_secs_f64() * 1000.0,
            output.shape()
        );

        Ok(output)
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        self.model_info.as_ref().map_or(
            (1, self.input_size, self.input_size, 3),
            |info| info.input_shape,
        )
    }

    fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    fn name(&self) -> &'static str {
        "onnx"
    }
}

#[cfg(all(test, feature = "onnx"))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_onnx_backend_creation() {
        let backend = OnnxBackend::new();
        assert!(!backend.is_initialized());
        assert_eq!(backend.input_shape(), (1, 256, 256, 3));
        assert_eq!(backend.name(), "onnx");
    }

    #[test]
    fn test_infer_before_initialize_fails() {
        let mut backend = OnnxBackend::new();
        let input = Array4::<f32>::zeros((1, 256, 256, 3));
        assert!(matches!(
            backend.infer(&input).unwrap_err(),
            MaskGenError::Inference(_)
        ));
    }

    #[test]
    fn test_rejects_tflite_model() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("segmentation.tflite");
        std::fs::write(&path, b"TFL3").unwrap();

        let config = MaskGenConfig::builder().model_path(&path).build().unwrap();
        let mut backend = OnnxBackend::new();
        let err = backend.initialize(&config).unwrap_err();
        assert!(err.to_string().contains("tract backend"));
        assert!(!backend.is_initialized());
    }
}
