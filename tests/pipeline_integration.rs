//! End-to-end mask generation over temporary datasets
//!
//! Uses the mock backend so the full load, preprocess, infer, postprocess and
//! save path runs without a model file.

use image::{GrayImage, ImageFormat, Rgb, RgbImage};
use maskgen::{
    BackendType, FailurePolicy, MaskFormat, MaskGenConfig, MaskGenError, MaskGenerator,
    MockBackend, MockPattern,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn create_dataset(names: &[&str], format: ImageFormat) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let images = temp_dir.path().join("images");
    fs::create_dir_all(&images).expect("Failed to create images directory");
    for name in names {
        RgbImage::from_pixel(40, 30, Rgb([200, 200, 200]))
            .save_with_format(images.join(name), format)
            .expect("Failed to write test image");
    }
    temp_dir
}

fn mock_config(dataset: &Path) -> MaskGenConfig {
    MaskGenConfig::builder()
        .backend_type(BackendType::Mock)
        .dataset_dir(dataset)
        .build()
        .expect("Failed to build config")
}

fn mask_files(dataset: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dataset.join("masks"))
        .expect("Failed to read masks directory")
        .map(|entry| {
            entry
                .expect("Failed to read directory entry")
                .file_name()
                .to_string_lossy()
                .to_string()
        })
        .collect();
    names.sort();
    names
}

fn file_names(paths: impl Iterator<Item = PathBuf>) -> Vec<String> {
    paths
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect()
}

#[test]
fn test_one_mask_per_image_in_sorted_order() {
    let dataset = create_dataset(&["page10.jpg", "page2.jpg", "cover.jpg"], ImageFormat::Jpeg);
    fs::write(dataset.path().join("images").join("notes.txt"), "not an image")
        .expect("Failed to write text file");

    let mut generator =
        MaskGenerator::new(mock_config(dataset.path())).expect("Failed to create generator");
    let report = generator.run().expect("Batch should succeed");

    assert!(report.is_success());
    assert_eq!(
        file_names(report.succeeded.iter().map(|o| o.image_path.clone())),
        vec!["cover.jpg", "page10.jpg", "page2.jpg"]
    );
    assert_eq!(mask_files(dataset.path()), vec!["cover.png", "page10.png", "page2.png"]);

    for outcome in &report.succeeded {
        let mask = image::open(&outcome.mask_path).expect("Mask should be readable");
        assert_eq!((mask.width(), mask.height()), (256, 256));
        assert_eq!(mask.color(), image::ColorType::L8);
    }
}

#[test]
fn test_corrupt_image_is_reported_and_skipped() {
    let dataset = create_dataset(&["a.jpg", "c.jpg"], ImageFormat::Jpeg);
    let broken = dataset.path().join("images").join("b.jpg");
    fs::write(&broken, [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10]).expect("Failed to write broken file");

    let mut generator =
        MaskGenerator::new(mock_config(dataset.path())).expect("Failed to create generator");
    let report = generator.run().expect("Continue policy should not abort");

    assert!(!report.is_success());
    assert_eq!(report.success_count(), 2);
    assert_eq!(report.failure_count(), 1);

    let failure = &report.failed[0];
    assert_eq!(failure.image_path, broken);
    assert!(matches!(failure.error, MaskGenError::Decode { .. }));
    assert_eq!(failure.error.path(), Some(broken.as_path()));

    assert_eq!(mask_files(dataset.path()), vec!["a.png", "c.png"]);
}

#[test]
fn test_fail_fast_stops_at_first_failure() {
    let dataset = create_dataset(&["1.jpg", "2.jpg", "3.jpg"], ImageFormat::Jpeg);
    let config = MaskGenConfig::builder()
        .backend_type(BackendType::Mock)
        .dataset_dir(dataset.path())
        .failure_policy(FailurePolicy::FailFast)
        .build()
        .expect("Failed to build config");

    let backend = MockBackend::new().failing_on_call(2);
    let handle = backend.clone();
    let mut generator =
        MaskGenerator::with_backend(config, Box::new(backend)).expect("Failed to create generator");

    let result = generator.run();
    assert!(matches!(result, Err(MaskGenError::Inference(_))));
    assert_eq!(handle.infer_count(), 2);
    assert_eq!(mask_files(dataset.path()), vec!["1.png"]);
}

#[test]
fn test_unexpected_output_shape_fails_each_image() {
    let dataset = create_dataset(&["x.jpg", "y.jpg"], ImageFormat::Jpeg);
    let backend = MockBackend::new().output_shape(&[1, 2, 256, 256]);
    let mut generator = MaskGenerator::with_backend(mock_config(dataset.path()), Box::new(backend))
        .expect("Failed to create generator");

    let report = generator.run().expect("Shape errors are per image");
    assert_eq!(report.failure_count(), 2);
    for failure in &report.failed {
        match &failure.error {
            MaskGenError::ShapeMismatch { expected, actual } => {
                assert_eq!(expected, &vec![256, 256]);
                assert_eq!(actual, &vec![1, 2, 256, 256]);
            },
            other => panic!("expected shape mismatch, got {other}"),
        }
    }
    assert!(mask_files(dataset.path()).is_empty());
}

#[test]
fn test_channels_first_singleton_output_is_accepted() {
    let dataset = create_dataset(&["doc.jpg"], ImageFormat::Jpeg);
    let backend = MockBackend::new()
        .pattern(MockPattern::Constant(1.0))
        .output_shape(&[1, 1, 256, 256]);
    let mut generator = MaskGenerator::with_backend(mock_config(dataset.path()), Box::new(backend))
        .expect("Failed to create generator");

    let report = generator.run().expect("Batch should succeed");
    assert!(report.is_success());

    let mask = image::open(&report.succeeded[0].mask_path)
        .expect("Mask should be readable")
        .to_luma8();
    assert!(mask.pixels().all(|p| p.0 == [255]));
}

#[test]
fn test_mask_values_follow_model_output() {
    let dataset = create_dataset(&["flat.png"], ImageFormat::Png);
    let config = MaskGenConfig::builder()
        .backend_type(BackendType::Mock)
        .dataset_dir(dataset.path())
        .image_pattern("*.png")
        .build()
        .expect("Failed to build config");
    let backend = MockBackend::new().pattern(MockPattern::InputLuma);
    let mut generator =
        MaskGenerator::with_backend(config, Box::new(backend)).expect("Failed to create generator");

    let report = generator.run().expect("Batch should succeed");
    let mask: GrayImage = image::open(&report.succeeded[0].mask_path)
        .expect("Mask should be readable")
        .to_luma8();

    assert!(mask.pixels().all(|p| p.0[0].abs_diff(200) <= 1));
}

#[test]
fn test_tiff_masks() {
    let dataset = create_dataset(&["scan.page.jpg"], ImageFormat::Jpeg);
    let config = MaskGenConfig::builder()
        .backend_type(BackendType::Mock)
        .dataset_dir(dataset.path())
        .mask_format(MaskFormat::Tiff)
        .build()
        .expect("Failed to build config");

    let report = MaskGenerator::new(config)
        .expect("Failed to create generator")
        .run()
        .expect("Batch should succeed");

    assert!(report.is_success());
    assert_eq!(mask_files(dataset.path()), vec!["scan.page.tiff"]);
    let mask = image::open(dataset.path().join("masks").join("scan.page.tiff"))
        .expect("TIFF mask should be readable");
    assert_eq!((mask.width(), mask.height()), (256, 256));
}

#[test]
fn test_backend_init_failure_aborts_before_any_image() {
    let dataset = create_dataset(&["a.jpg"], ImageFormat::Jpeg);
    let backend = MockBackend::new().failing_init();
    let handle = backend.clone();
    let mut generator = MaskGenerator::with_backend(mock_config(dataset.path()), Box::new(backend))
        .expect("Failed to create generator");

    let result = generator.run();
    assert!(matches!(result, Err(MaskGenError::Model(_))));
    assert_eq!(handle.infer_count(), 0);
    assert!(mask_files(dataset.path()).is_empty());
}

#[test]
fn test_empty_images_dir_yields_empty_report() {
    let dataset = create_dataset(&[], ImageFormat::Jpeg);
    let report = MaskGenerator::new(mock_config(dataset.path()))
        .expect("Failed to create generator")
        .run()
        .expect("Empty batch should succeed");

    assert_eq!(report.total(), 0);
    assert!(report.is_success());
}

#[test]
fn test_missing_images_dir_is_an_error() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let result = MaskGenerator::new(mock_config(temp_dir.path()))
        .expect("Failed to create generator")
        .run();
    assert!(result.is_err());
}
