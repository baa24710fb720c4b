//! Image preprocessing and mask postprocessing utilities

pub mod postprocessing;
pub mod preprocessing;

pub use postprocessing::{clip_probability, quantize, round_scaled, MaskPostprocessor};
pub use preprocessing::{resize_bilinear, ImagePreprocessor, PreprocessingConfig, ResizeFilter};
