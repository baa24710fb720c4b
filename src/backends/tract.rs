//! Tract backend implementation for segmentation models
//!
//! Pure Rust inference through Tract. TensorFlow Lite models are loaded with
//! `tract-tflite` and ONNX models with `tract-onnx`; both are optimized into a
//! runnable typed plan once at initialization.

use crate::config::MaskGenConfig;
use crate::error::{MaskGenError, Result};
use crate::inference::InferenceBackend;
use crate::models::{ModelArtifact, ModelFormat, ModelInfo};
use log;
use ndarray::{Array4, ArrayD, IxDyn};
use tract_onnx::prelude::*;

/// Type alias for the complex Tract model type to reduce complexity warnings
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

// Use instant crate for cross-platform time compatibility
use instant::{Duration, Instant};

/// Tract backend for running segmentation models using pure Rust inference
#[derive(Debug)]
pub struct TractBackend {
    model: Option<TractModel>,
    model_info: Option<ModelInfo>,
    input_size: usize,
}

impl TractBackend {
    /// Create a new uninitialized Tract backend
    #[must_use]
    pub fn new() -> Self {
        Self {
            model: None,
            model_info: None,
            input_size: crate::config::MODEL_INPUT_SIZE as usize,
        }
    }

    /// Load and initialize the model using Tract
    fn load_model(&mut self, config: &MaskGenConfig) -> Result<Duration> {
        let model_load_start = Instant::now();

        let artifact = ModelArtifact::load(&config.model_path)?;
        let info = artifact.info(config.input_size);
        self.input_size = config.input_size as usize;

        log::info!("Initializing Tract backend");
        log::info!("  - Model: {} ({})", info.name, info.format);
        #[allow(clippy::cast_precision_loss)] // Precision loss acceptable for logging display
        let size_mb = info.size_bytes as f64 / (1024.0 * 1024.0);
        log::info!("  - Model size: {size_mb:.2} MB");

        let (n, h, w, c) = info.input_shape;
        let model = match artifact.format() {
            ModelFormat::TfLite => {
                log::debug!("Creating Tract model from TFLite data...");
                tract_tflite::tflite()
                    .model_for_read(&mut std::io::Cursor::new(artifact.data()))
                    .map_err(|e| {
                        MaskGenError::model(format!("Failed to load TFLite model: {e}"))
                    })?
                    .into_optimized()
                    .map_err(|e| MaskGenError::model(format!("Failed to optimize model: {e}")))?
                    .into_runnable()
                    .map_err(|e| {
                        MaskGenError::model(format!("Failed to create runnable model: {e}"))
                    })?
            },
            ModelFormat::Onnx => {
                log::debug!("Creating Tract model from ONNX data...");
                onnx()
                    .model_for_read(&mut std::io::Cursor::new(artifact.data()))
                    .map_err(|e| MaskGenError::model(format!("Failed to load ONNX model: {e}")))?
                    .with_input_fact(0, f32::fact([n, h, w, c]).into())
                    .map_err(|e| {
                        MaskGenError::model(format!("Failed to pin model input shape: {e}"))
                    })?
                    .into_optimized()
                    .map_err(|e| MaskGenError::model(format!("Failed to optimize model: {e}")))?
                    .into_runnable()
                    .map_err(|e| {
                        MaskGenError::model(format!("Failed to create runnable model: {e}"))
                    })?
            },
        };

        self.model = Some(model);
        self.model_info = Some(info);

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "Tract backend initialized in {}ms",
            model_load_time.as_millis()
        );

        Ok(model_load_time)
    }

    /// Model metadata, once initialized
    #[must_use]
    pub fn model_info(&self) -> Option<&ModelInfo> {
        self.model_info.as_ref()
    }
}

impl Default for TractBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for TractBackend {
    fn initialize(&mut self, config: &MaskGenConfig) -> Result<Option<Duration>> {
        if self.model.is_some() {
            return Ok(None);
        }

        let model_load_time = self.load_model(config)?;
        Ok(Some(model_load_time))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<ArrayD<f32>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| MaskGenError::inference("Tract model not initialized"))?;

        log::debug!("Running Tract inference on {:?}", input.shape());
        let inference_start = Instant::now();

        let data: Vec<f32> = input.iter().copied().collect();
        let input_tensor = Tensor::from_shape(input.shape(), &data).map_err(|e| {
            MaskGenError::inference(format!("Failed to convert input tensor: {e}"))
        })?;

        let outputs = model
            .run(tvec![input_tensor.into()])
            .map_err(|e| MaskGenError::inference(format!("Tract inference failed: {e}")))?;

        let output_tensor = outputs
            .into_iter()
            .next()
            .ok_or_else(|| MaskGenError::inference("No output tensor found"))?
            .into_arc_tensor();

        let output_data = output_tensor.as_slice::<f32>().map_err(|e| {
            MaskGenError::inference(format!("Failed to read output tensor as f32: {e}"))
        })?;

        let output_array =
            ArrayD::from_shape_vec(IxDyn(output_tensor.shape()), output_data.to_vec()).map_err(
                |e| MaskGenError::inference(format!("Failed to reshape output tensor: {e}")),
            )?;

        log::debug!(
            "Tract inference completed in {}ms, output {:?}",
            inference_start.elapsed().as_millis(),
            output_array.shape()
        );

        Ok(output_array)
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        self.model_info.as_ref().map_or(
            (1, self.input_size, self.input_size, 3),
            |info| info.input_shape,
        )
    }

    fn is_initialized(&self) -> bool {
        self.model.is_some()
    }

    fn name(&self) -> &'static str {
        "tract"
    }
}
