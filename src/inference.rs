//! Inference backend abstraction and factory

use crate::{
    backends::MockBackend,
    config::{BackendType, MaskGenConfig},
    error::Result,
};
use ndarray::{Array4, ArrayD};

// Use instant crate for cross-platform time compatibility
use instant::Duration;

/// Trait for inference backends
///
/// A backend maps a `(1, H, W, 3)` NHWC float tensor to a per-pixel foreground
/// probability tensor. Calls are independent: no state carries over between
/// images.
pub trait InferenceBackend {
    /// Load the model named by the configuration
    ///
    /// Returns the model load time, or `None` if already initialized.
    ///
    /// # Errors
    /// - Model file missing, unreadable or in an unsupported format
    /// - Backend runtime initialization failures
    fn initialize(&mut self, config: &MaskGenConfig) -> Result<Option<Duration>>;

    /// Run inference on the input tensor
    ///
    /// # Errors
    /// - Backend not initialized
    /// - Model inference failures
    /// - Tensor conversion errors
    fn infer(&mut self, input: &Array4<f32>) -> Result<ArrayD<f32>>;

    /// Expected NHWC input shape
    fn input_shape(&self) -> (usize, usize, usize, usize);

    /// Check if backend is initialized
    fn is_initialized(&self) -> bool;

    /// Short backend name for logging
    fn name(&self) -> &'static str;
}

/// Create an uninitialized backend of the requested type
///
/// # Errors
/// - The backend's cargo feature is not enabled in this build
pub fn create_backend(
    backend_type: BackendType,
    config: &MaskGenConfig,
) -> Result<Box<dyn InferenceBackend>> {
    match backend_type {
        BackendType::Mock => Ok(Box::new(MockBackend::with_input_size(config.input_size))),
        #[cfg(feature = "tract")]
        BackendType::Tract => Ok(Box::new(crate::backends::TractBackend::new())),
        #[cfg(not(feature = "tract"))]
        BackendType::Tract => Err(crate::error::MaskGenError::invalid_config(
            "Tract backend not available. Rebuild with --features tract",
        )),
        #[cfg(feature = "onnx")]
        BackendType::Onnx => Ok(Box::new(crate::backends::OnnxBackend::new())),
        #[cfg(not(feature = "onnx"))]
        BackendType::Onnx => Err(crate::error::MaskGenError::invalid_config(
            "ONNX backend not available. Rebuild with --features onnx",
        )),
    }
}

/// List backend types compiled into this build
#[must_use]
pub fn available_backends() -> Vec<BackendType> {
    let mut backends = Vec::new();
    #[cfg(feature = "tract")]
    backends.push(BackendType::Tract);
    #[cfg(feature = "onnx")]
    backends.push(BackendType::Onnx);
    backends.push(BackendType::Mock);
    backends
}
