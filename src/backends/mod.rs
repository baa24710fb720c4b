//! Backend implementations for different inference engines
//!
//! - Tract backend (pure Rust, `.tflite` and `.onnx` models)
//! - ONNX Runtime backend (GPU acceleration)
//! - Mock backend (synthetic masks for tests and dry runs)

pub mod mock;

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "tract")]
pub mod tract;

pub use self::mock::{MockBackend, MockPattern};

// Re-export backends based on enabled features
#[cfg(feature = "onnx")]
pub use self::onnx::OnnxBackend;

#[cfg(feature = "tract")]
pub use self::tract::TractBackend;
