//! Image I/O operations service
//!
//! Keeps file system access out of the pipeline so the processing steps stay
//! pure and testable.

use crate::{
    config::MaskFormat,
    error::{MaskGenError, Result},
};
use image::{DynamicImage, GrayImage, RgbImage};
use std::path::{Path, PathBuf};

/// Service for handling image file input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Load an image from a file path and convert it to RGB8
    ///
    /// Extension-based format detection is tried first, then content-based
    /// detection, so a PNG saved with a `.jpg` name still decodes.
    ///
    /// # Examples
    /// ```rust,no_run
    /// use maskgen::services::ImageIOService;
    ///
    /// let image = ImageIOService::load_image("dataset/images/0001.jpg")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    ///
    /// # Errors
    /// - `MaskGenError::Decode` naming `path` when the file is missing,
    ///   unreadable or not a decodable image
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<RgbImage> {
        Ok(Self::load_dynamic(path)?.to_rgb8())
    }

    /// Load an image without color conversion
    pub fn load_dynamic<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();

        if !path_ref.is_file() {
            return Err(MaskGenError::decode(path_ref, "file does not exist"));
        }

        match image::open(path_ref) {
            Ok(img) => Ok(img),
            Err(e) => {
                log::debug!(
                    "Extension-based loading failed for {}: {}. Attempting content-based detection.",
                    path_ref.display(),
                    e
                );

                let data = std::fs::read(path_ref)
                    .map_err(|io_err| MaskGenError::decode(path_ref, io_err.to_string()))?;

                image::load_from_memory(&data).map_err(|content_err| {
                    MaskGenError::decode(
                        path_ref,
                        format!(
                            "extension-based decode failed ({e}), content-based decode failed ({content_err}), {} bytes",
                            data.len()
                        ),
                    )
                })
            },
        }
    }

    /// Write a mask as a single-channel 8-bit image, overwriting any existing file
    ///
    /// # Errors
    /// - `MaskGenError::Write` naming `path` on any encoding or file system failure
    pub fn save_mask<P: AsRef<Path>>(mask: &GrayImage, path: P, format: MaskFormat) -> Result<()> {
        let path_ref = path.as_ref();
        mask.save_with_format(path_ref, format.image_format())
            .map_err(|e| MaskGenError::write(path_ref, e.to_string()))?;

        log::debug!(
            "Saved {}x{} mask to {}",
            mask.width(),
            mask.height(),
            path_ref.display()
        );
        Ok(())
    }

    /// Save an RGB image, creating parent directories as needed
    pub fn save_rgb<P: AsRef<Path>>(image: &RgbImage, path: P) -> Result<()> {
        let path_ref = path.as_ref();
        if let Some(parent) = path_ref.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| MaskGenError::file_io_error("create output directory", parent, &e))?;
        }
        image
            .save(path_ref)
            .map_err(|e| MaskGenError::write(path_ref, e.to_string()))
    }

    /// List files in `dir` whose file name matches the glob `pattern`
    ///
    /// Not recursive. The result is sorted lexicographically by path.
    ///
    /// # Errors
    /// - Invalid glob pattern
    /// - Directory missing or unreadable
    pub fn find_images<P: AsRef<Path>>(dir: P, pattern: &str) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        let matcher = glob::Pattern::new(pattern).map_err(|e| {
            MaskGenError::invalid_config(format!("Invalid image pattern '{pattern}': {e}"))
        })?;

        let entries = std::fs::read_dir(dir)
            .map_err(|e| MaskGenError::file_io_error("list images in", dir, &e))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| MaskGenError::file_io_error("list images in", dir, &e))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let matches = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| matcher.matches(name));
            if matches {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }

    /// Mask location for `image_path`: same stem, mask extension, under `masks_dir`
    #[must_use]
    pub fn mask_path_for(image_path: &Path, masks_dir: &Path, format: MaskFormat) -> PathBuf {
        let mut file_name = image_path.file_stem().unwrap_or_default().to_os_string();
        file_name.push(".");
        file_name.push(format.extension());
        masks_dir.join(file_name)
    }

    /// Create `dir` (and parents) if it does not exist
    pub fn ensure_dir<P: AsRef<Path>>(dir: P) -> Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .map_err(|e| MaskGenError::file_io_error("create directory", dir, &e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Luma, Rgb};
    use tempfile::tempdir;

    fn write_jpeg(path: &Path, width: u32, height: u32) {
        RgbImage::from_pixel(width, height, Rgb([120, 60, 30]))
            .save_with_format(path, ImageFormat::Jpeg)
            .unwrap();
    }

    #[test]
    fn test_load_image_converts_to_rgb() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        write_jpeg(&path, 40, 30);

        let image = ImageIOService::load_image(&path).unwrap();
        assert_eq!(image.dimensions(), (40, 30));
    }

    #[test]
    fn test_load_image_falls_back_to_content_detection() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("actually_png.jpg");
        RgbImage::from_pixel(5, 5, Rgb([1, 2, 3]))
            .save_with_format(&path, ImageFormat::Png)
            .unwrap();

        let image = ImageIOService::load_image(&path).unwrap();
        assert_eq!(image.get_pixel(0, 0).0, [1, 2, 3]);
    }

    #[test]
    fn test_load_corrupt_image_is_decode_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"not an image at all").unwrap();

        let err = ImageIOService::load_image(&path).unwrap_err();
        assert!(matches!(err, MaskGenError::Decode { .. }));
        assert_eq!(err.path(), Some(path.as_path()));
    }

    #[test]
    fn test_load_missing_image_is_decode_error() {
        let err = ImageIOService::load_image("/nonexistent/dir/missing.jpg").unwrap_err();
        assert!(matches!(err, MaskGenError::Decode { .. }));
    }

    #[test]
    fn test_save_mask_png_is_single_channel() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mask.png");
        let mask = GrayImage::from_pixel(8, 8, Luma([200]));

        ImageIOService::save_mask(&mask, &path, MaskFormat::Png).unwrap();

        let reloaded = image::open(&path).unwrap();
        assert_eq!(reloaded.color(), image::ColorType::L8);
        assert_eq!(reloaded.to_luma8().get_pixel(3, 3).0, [200]);
    }

    #[test]
    fn test_save_mask_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mask.png");
        ImageIOService::save_mask(&GrayImage::from_pixel(4, 4, Luma([1])), &path, MaskFormat::Png)
            .unwrap();
        ImageIOService::save_mask(&GrayImage::from_pixel(4, 4, Luma([9])), &path, MaskFormat::Png)
            .unwrap();
        assert_eq!(image::open(&path).unwrap().to_luma8().get_pixel(0, 0).0, [9]);
    }

    #[test]
    fn test_save_mask_into_missing_directory_is_write_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("no_such_dir").join("mask.png");
        let err = ImageIOService::save_mask(&GrayImage::new(2, 2), &path, MaskFormat::Png)
            .unwrap_err();
        assert!(matches!(err, MaskGenError::Write { .. }));
        assert_eq!(err.path(), Some(path.as_path()));
    }

    #[test]
    fn test_find_images_filters_and_sorts() {
        let dir = tempdir().unwrap();
        for name in ["b.jpg", "a.jpg", "c.png", "notes.txt", "10.jpg"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.jpg")).unwrap();

        let files = ImageIOService::find_images(dir.path(), "*.jpg").unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["10.jpg", "a.jpg", "b.jpg"]);
    }

    #[test]
    fn test_find_images_rejects_invalid_pattern() {
        let dir = tempdir().unwrap();
        let err = ImageIOService::find_images(dir.path(), "[").unwrap_err();
        assert!(matches!(err, MaskGenError::InvalidConfig(_)));
    }

    #[test]
    fn test_find_images_missing_directory() {
        let err = ImageIOService::find_images("/nonexistent/images", "*.jpg").unwrap_err();
        assert!(matches!(err, MaskGenError::Io(_)));
    }

    #[test]
    fn test_mask_path_for() {
        let masks = Path::new("/data/masks");
        assert_eq!(
            ImageIOService::mask_path_for(Path::new("/data/images/0001.jpg"), masks, MaskFormat::Png),
            PathBuf::from("/data/masks/0001.png")
        );
        assert_eq!(
            ImageIOService::mask_path_for(
                Path::new("/data/images/scan.page.jpg"),
                masks,
                MaskFormat::Tiff
            ),
            PathBuf::from("/data/masks/scan.page.tiff")
        );
    }
}
