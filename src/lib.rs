#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # maskgen
//!
//! Batch segmentation mask generation for document-scanning datasets, using Tract or
//! ONNX Runtime to run a single-channel segmentation model over every image in a directory.
//!
//! ## Features
//!
//! - **Two Model Formats**: `.tflite` (Tract) and `.onnx` (Tract or ONNX Runtime)
//! - **Deterministic Preprocessing**: Bilinear resize with half-pixel centres, `[-1, 1]` normalization
//! - **Lossless Masks**: 8-bit grayscale PNG or TIFF, one per input image
//! - **Failure Policies**: Continue past bad images and report them, or stop at the first one
//! - **Comparison Reports**: Overlay several mask directories on the inputs in one HTML page
//! - **CLI Integration**: Optional command-line interface (enable with `cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use maskgen::{generate_masks, MaskGenConfig};
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = MaskGenConfig::builder()
//!     .model_path("fairscan-segmentation-model.tflite")
//!     .dataset_dir("dataset")
//!     .build()?;
//!
//! let report = generate_masks(&config)?;
//! println!("{} masks written, {} failures", report.success_count(), report.failure_count());
//! # Ok(())
//! # }
//! ```
//!
//! ## Single Images
//!
//! ```rust,no_run
//! use maskgen::{MaskGenConfig, MaskGenerator, ImageIOService};
//!
//! # fn example() -> anyhow::Result<()> {
//! let mut generator = MaskGenerator::new(MaskGenConfig::default())?;
//! let image = ImageIOService::load_image("page.jpg")?;
//! let (mask, timings) = generator.process_image(&image)?;
//! mask.save("page-mask.png")?;
//! println!("inference took {}ms", timings.inference_ms);
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `tract` (default): Pure Rust backend for `.tflite` and `.onnx` models
//! - `onnx`: ONNX Runtime backend with CUDA and `CoreML` execution providers
//! - `cli` (default): Command-line interface, progress bar and log subscriber
//! - `tracing-json`: JSON log output for the CLI

pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod inference;
pub mod models;
pub mod processor;
pub mod report;
pub mod services;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod utils;

// Public API exports
pub use backends::*;
pub use config::{
    BackendType, ExecutionProvider, FailurePolicy, MaskFormat, MaskGenConfig,
    MaskGenConfigBuilder, RoundingMode,
};
pub use error::{MaskGenError, Result};
pub use inference::{available_backends, create_backend, InferenceBackend};
pub use models::{ModelArtifact, ModelFormat, ModelInfo};
pub use processor::MaskGenerator;
pub use report::{overlay_mask, ComparisonReport, MaskSet, ReportSummary};
pub use services::{
    BatchProgressUpdate, ConsoleProgressReporter, ImageIOService, NoOpProgressReporter,
    ProcessingStage, ProgressReporter, ProgressUpdate,
};
pub use types::{BatchReport, FailedImage, MaskOutcome, ProcessingTimings};
pub use utils::{ImagePreprocessor, MaskPostprocessor, PreprocessingConfig, ResizeFilter};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat};

/// Generate one mask per matching image under the configured dataset
///
/// Builds the configured backend, scans `images_dir` for files matching
/// `image_pattern` in sorted order and writes `<masks_dir>/<stem>.<ext>`
/// for each of them.
///
/// # Errors
/// - Invalid configuration or unavailable backend
/// - Model loading failures
/// - Missing images directory or unwritable masks directory
/// - The first per-image failure under [`FailurePolicy::FailFast`]
///
/// Under [`FailurePolicy::Continue`] per-image failures are collected in the
/// returned [`BatchReport`] instead.
pub fn generate_masks(config: &MaskGenConfig) -> Result<BatchReport> {
    let mut generator = MaskGenerator::new(config.clone())?;
    generator.run()
}
