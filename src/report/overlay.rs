//! Mask overlay rendering

use image::{imageops::FilterType, GrayImage, RgbImage};

/// Offset subtracted from every input sample before taking the absolute value
const DARKEN_OFFSET: u8 = 80;

/// Amount added to the green channel of foreground pixels (0.6 * 255)
const HIGHLIGHT_GREEN: u8 = 153;

/// Draw `mask` in green over a darkened copy of `input`
///
/// The mask is resized to the input dimensions with nearest-neighbour sampling
/// and min-max normalized; every pixel above the mask minimum is highlighted.
/// A constant mask highlights nothing.
#[must_use]
pub fn overlay_mask(input: &RgbImage, mask: &GrayImage) -> RgbImage {
    let (width, height) = input.dimensions();
    let mask = if mask.dimensions() == (width, height) {
        mask.clone()
    } else {
        image::imageops::resize(mask, width, height, FilterType::Nearest)
    };

    let (min, max) = mask
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])));
    let has_range = max > min;

    let mut output = RgbImage::new(width, height);
    for ((out, src), m) in output.pixels_mut().zip(input.pixels()).zip(mask.pixels()) {
        let [r, g, b] = src.0;
        let mut pixel = [
            r.abs_diff(DARKEN_OFFSET),
            g.abs_diff(DARKEN_OFFSET),
            b.abs_diff(DARKEN_OFFSET),
        ];
        if has_range && m.0[0] > min {
            pixel[1] = pixel[1].saturating_add(HIGHLIGHT_GREEN);
        }
        out.0 = pixel;
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    #[test]
    fn test_background_is_darkened_only() {
        let input = RgbImage::from_pixel(4, 4, Rgb([200, 100, 30]));
        let mut mask = GrayImage::new(4, 4);
        mask.put_pixel(0, 0, Luma([255]));

        let output = overlay_mask(&input, &mask);
        assert_eq!(output.get_pixel(3, 3).0, [120, 20, 50]);
        assert_eq!(output.get_pixel(0, 0).0, [120, 173, 50]);
    }

    #[test]
    fn test_green_channel_saturates() {
        let input = RgbImage::from_pixel(2, 1, Rgb([0, 0, 0]));
        let mut mask = GrayImage::new(2, 1);
        mask.put_pixel(1, 0, Luma([10]));

        let output = overlay_mask(&input, &mask);
        assert_eq!(output.get_pixel(1, 0).0, [80, 233, 80]);

        let bright = RgbImage::from_pixel(2, 1, Rgb([255, 255, 255]));
        assert_eq!(overlay_mask(&bright, &mask).get_pixel(1, 0).0, [175, 255, 175]);
    }

    #[test]
    fn test_constant_mask_highlights_nothing() {
        let input = RgbImage::from_pixel(3, 3, Rgb([80, 80, 80]));
        let mask = GrayImage::from_pixel(3, 3, Luma([255]));
        let output = overlay_mask(&input, &mask);
        assert!(output.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn test_mask_resized_to_input() {
        let input = RgbImage::from_pixel(8, 4, Rgb([80, 80, 80]));
        let mut mask = GrayImage::new(2, 2);
        mask.put_pixel(1, 0, Luma([255]));

        let output = overlay_mask(&input, &mask);
        assert_eq!(output.dimensions(), (8, 4));
        assert_eq!(output.get_pixel(7, 0).0, [0, 153, 0]);
        assert_eq!(output.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(output.get_pixel(7, 3).0, [0, 0, 0]);
    }
}
