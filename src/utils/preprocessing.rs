//! Image preprocessing for segmentation inference
//!
//! Turns a decoded image into the NHWC tensor the segmentation model expects:
//! resize to a square input, then map every 8-bit sample to [-1, 1].

use crate::{
    config::MODEL_INPUT_SIZE,
    error::{MaskGenError, Result},
};
use image::{imageops::FilterType, DynamicImage, RgbImage};
use ndarray::Array4;
use serde::{Deserialize, Serialize};

/// Resampling filter used to bring images to the model input size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeFilter {
    /// 4-tap bilinear with half-pixel centres, matching OpenCV `INTER_LINEAR`
    #[default]
    Bilinear,
    /// `image` crate triangle filter (area-aware when downscaling)
    Triangle,
    /// `image` crate Lanczos3 filter
    Lanczos3,
}

/// Preprocessing parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessingConfig {
    /// Width and height of the square model input
    pub target_size: u32,
    pub filter: ResizeFilter,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            target_size: MODEL_INPUT_SIZE,
            filter: ResizeFilter::default(),
        }
    }
}

impl PreprocessingConfig {
    #[must_use]
    pub fn with_target_size(target_size: u32) -> Self {
        Self {
            target_size,
            ..Self::default()
        }
    }
}

/// Image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Preprocess an image into a `(1, size, size, 3)` tensor with values in [-1, 1]
    ///
    /// The aspect ratio is not preserved. Resampled pixels are rounded back to
    /// 8-bit before normalization, so the tensor only holds values of the form
    /// `v / 127.5 - 1` for integer `v` in `0..=255`.
    pub fn preprocess(image: &DynamicImage, config: &PreprocessingConfig) -> Result<Array4<f32>> {
        let rgb = image.to_rgb8();
        Self::preprocess_rgb(&rgb, config)
    }

    /// Same as [`ImagePreprocessor::preprocess`] for an already converted RGB image
    pub fn preprocess_rgb(image: &RgbImage, config: &PreprocessingConfig) -> Result<Array4<f32>> {
        let size = config.target_size;
        if size == 0 {
            return Err(MaskGenError::invalid_config(
                "Preprocessing target size must be greater than zero",
            ));
        }
        if image.width() == 0 || image.height() == 0 {
            return Err(MaskGenError::inference(format!(
                "Cannot preprocess empty image ({}x{})",
                image.width(),
                image.height()
            )));
        }

        let resized = Self::resize(image, size, size, config.filter);
        Self::to_tensor(&resized)
    }

    /// Resize `image` to `width` x `height` with the given filter
    #[must_use]
    pub fn resize(image: &RgbImage, width: u32, height: u32, filter: ResizeFilter) -> RgbImage {
        if image.dimensions() == (width, height) {
            return image.clone();
        }
        match filter {
            ResizeFilter::Bilinear => resize_bilinear(image, width, height),
            ResizeFilter::Triangle => {
                image::imageops::resize(image, width, height, FilterType::Triangle)
            },
            ResizeFilter::Lanczos3 => {
                image::imageops::resize(image, width, height, FilterType::Lanczos3)
            },
        }
    }

    /// Normalize an RGB image into an NHWC tensor
    ///
    /// `RgbImage` stores samples row-major with interleaved channels, which is
    /// exactly the NHWC layout for a single image.
    pub fn to_tensor(image: &RgbImage) -> Result<Array4<f32>> {
        let (width, height) = image.dimensions();
        let data: Vec<f32> = image
            .as_raw()
            .iter()
            .map(|&sample| f32::from(sample) / 127.5 - 1.0)
            .collect();

        Array4::from_shape_vec((1, height as usize, width as usize, 3), data)
            .map_err(|e| MaskGenError::inference(format!("Failed to build input tensor: {e}")))
    }
}

/// Map destination index `dst` to a source index pair and weight
///
/// Half-pixel centres: `src = (dst + 0.5) * scale - 0.5`, clamped to the image.
fn sample_coordinates(dst: u32, scale: f32, src_len: u32) -> (u32, u32, f32) {
    let last = src_len.saturating_sub(1);
    let position = (dst as f32 + 0.5) * scale - 0.5;
    if position <= 0.0 {
        return (0, 0, 0.0);
    }
    let lower = position.floor();
    let weight = position - lower;
    let lower = lower as u32;
    if lower >= last {
        return (last, last, 0.0);
    }
    (lower, lower + 1, weight)
}

/// 4-tap bilinear resize with half-pixel centres, rounding back to 8-bit
#[must_use]
pub fn resize_bilinear(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    let (src_width, src_height) = image.dimensions();
    if src_width == 0 || src_height == 0 || width == 0 || height == 0 {
        return RgbImage::new(width, height);
    }

    let scale_x = src_width as f32 / width as f32;
    let scale_y = src_height as f32 / height as f32;

    let columns: Vec<(u32, u32, f32)> = (0..width)
        .map(|x| sample_coordinates(x, scale_x, src_width))
        .collect();

    let mut output = RgbImage::new(width, height);
    for y in 0..height {
        let (y0, y1, wy) = sample_coordinates(y, scale_y, src_height);
        for (x, &(x0, x1, wx)) in (0..width).zip(columns.iter()) {
            let p00 = image.get_pixel(x0, y0).0;
            let p01 = image.get_pixel(x1, y0).0;
            let p10 = image.get_pixel(x0, y1).0;
            let p11 = image.get_pixel(x1, y1).0;

            let mut pixel = [0u8; 3];
            for (c, out) in pixel.iter_mut().enumerate() {
                let channel = |p: [u8; 3]| p.get(c).copied().map_or(0.0, f32::from);
                let top = channel(p00) * (1.0 - wx) + channel(p01) * wx;
                let bottom = channel(p10) * (1.0 - wx) + channel(p11) * wx;
                let value = top * (1.0 - wy) + bottom * wy;
                *out = value.round().clamp(0.0, 255.0) as u8;
            }
            output.put_pixel(x, y, image::Rgb(pixel));
        }
    }

    output
}
