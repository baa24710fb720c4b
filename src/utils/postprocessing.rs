//! Converting raw model output into 8-bit mask images

use crate::{
    config::RoundingMode,
    error::{MaskGenError, Result},
};
use image::GrayImage;
use ndarray::{Array2, ArrayD};

/// Mask postprocessing utilities
pub struct MaskPostprocessor;

impl MaskPostprocessor {
    /// Full postprocessing: squeeze, clip, scale, round, build the image
    pub fn process(output: &ArrayD<f32>, size: usize, rounding: RoundingMode) -> Result<GrayImage> {
        let mask = Self::to_mask_tensor(output, size)?;
        Self::to_mask_image(&mask, rounding)
    }

    /// Remove singleton dimensions and check the remainder is `(size, size)`
    ///
    /// Accepts e.g. `(1, size, size, 1)`, `(1, 1, size, size)` or `(size, size)`.
    /// Values are clipped to [0, 1]; NaN becomes 0.
    pub fn to_mask_tensor(output: &ArrayD<f32>, size: usize) -> Result<Array2<f32>> {
        let expected = [size, size];
        let squeezed: Vec<usize> = output.shape().iter().copied().filter(|&d| d != 1).collect();
        let expected_squeezed: Vec<usize> = expected.iter().copied().filter(|&d| d != 1).collect();

        if squeezed != expected_squeezed {
            return Err(MaskGenError::shape_mismatch(&expected, output.shape()));
        }

        let data: Vec<f32> = output.iter().map(|&v| clip_probability(v)).collect();
        Array2::from_shape_vec((size, size), data)
            .map_err(|_| MaskGenError::shape_mismatch(&expected, output.shape()))
    }

    /// Scale a `(height, width)` probability map to an 8-bit grayscale image
    pub fn to_mask_image(mask: &Array2<f32>, rounding: RoundingMode) -> Result<GrayImage> {
        let (height, width) = mask.dim();
        let data: Vec<u8> = mask.iter().map(|&v| quantize(v, rounding)).collect();

        GrayImage::from_raw(width as u32, height as u32, data).ok_or_else(|| {
            MaskGenError::inference(format!(
                "Mask buffer does not match {width}x{height} image dimensions"
            ))
        })
    }
}

/// Clip a probability to [0, 1], mapping NaN to 0
#[must_use]
pub fn clip_probability(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Convert a probability to an 8-bit mask value
#[must_use]
pub fn quantize(probability: f32, rounding: RoundingMode) -> u8 {
    round_scaled(clip_probability(probability) * 255.0, rounding)
}

/// Round an already scaled value in [0, 255] to `u8`
#[must_use]
pub fn round_scaled(scaled: f32, rounding: RoundingMode) -> u8 {
    let rounded = match rounding {
        RoundingMode::HalfToEven => scaled.round_ties_even(),
        RoundingMode::HalfAwayFromZero => scaled.round(),
    };
    rounded.clamp(0.0, 255.0) as u8
}
