//! Batch mask generation
//!
//! `MaskGenerator` owns the inference backend and runs every image of a
//! dataset through load, preprocess, infer, postprocess and write, one image at
//! a time.

use crate::{
    config::{FailurePolicy, MaskGenConfig},
    error::Result,
    inference::{create_backend, InferenceBackend},
    services::{
        BatchProgressUpdate, ImageIOService, NoOpProgressReporter, ProcessingStage,
        ProgressReporter, ProgressUpdate,
    },
    types::{BatchReport, FailedImage, MaskOutcome, ProcessingTimings},
    utils::{ImagePreprocessor, MaskPostprocessor, PreprocessingConfig, ResizeFilter},
};
use image::{GrayImage, RgbImage};
use instant::Instant;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, info_span, instrument, span, warn, Level};

/// Generates segmentation masks for a directory of images
pub struct MaskGenerator {
    config: MaskGenConfig,
    backend: Box<dyn InferenceBackend>,
    preprocessing: PreprocessingConfig,
    progress: Box<dyn ProgressReporter>,
    /// Model load time not yet attributed to an image
    pending_model_load_ms: u64,
}

impl std::fmt::Debug for MaskGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaskGenerator")
            .field("config", &self.config)
            .field("backend", &self.backend.name())
            .field("preprocessing", &self.preprocessing)
            .finish_non_exhaustive()
    }
}

impl MaskGenerator {
    /// Create a generator with the backend named in `config`
    ///
    /// The model is not loaded until [`MaskGenerator::initialize`] or the first
    /// image.
    ///
    /// # Errors
    /// - Invalid configuration
    /// - Backend not compiled into this build
    pub fn new(config: MaskGenConfig) -> Result<Self> {
        config.validate()?;
        let backend = create_backend(config.backend_type, &config)?;
        Self::with_backend(config, backend)
    }

    /// Create a generator around an existing backend
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn with_backend(config: MaskGenConfig, backend: Box<dyn InferenceBackend>) -> Result<Self> {
        config.validate()?;
        let preprocessing = PreprocessingConfig::with_target_size(config.input_size);
        Ok(Self {
            config,
            backend,
            preprocessing,
            progress: Box::new(NoOpProgressReporter),
            pending_model_load_ms: 0,
        })
    }

    /// Report progress to `reporter`
    #[must_use]
    pub fn with_progress_reporter(mut self, reporter: Box<dyn ProgressReporter>) -> Self {
        self.progress = reporter;
        self
    }

    /// Use a different resampling filter for preprocessing
    #[must_use]
    pub fn with_resize_filter(mut self, filter: ResizeFilter) -> Self {
        self.preprocessing.filter = filter;
        self
    }

    #[must_use]
    pub fn config(&self) -> &MaskGenConfig {
        &self.config
    }

    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Load the model if it is not loaded yet
    ///
    /// # Errors
    /// - Model missing, unreadable or rejected by the backend
    pub fn initialize(&mut self) -> Result<()> {
        if self.backend.is_initialized() {
            return Ok(());
        }

        info!(
            backend = self.backend.name(),
            model = %self.config.model_path.display(),
            "Initializing mask generator"
        );
        self.progress.report_progress(ProgressUpdate::new(
            ProcessingStage::Initialization,
            Instant::now(),
        ));

        if let Some(load_time) = self.backend.initialize(&self.config)? {
            self.pending_model_load_ms = load_time.as_millis() as u64;
            debug!(model_load_ms = self.pending_model_load_ms, "Model loaded");
        }
        Ok(())
    }

    /// Turn a decoded image into an 8-bit mask of the model input size
    ///
    /// # Errors
    /// - Model loading failures on first use
    /// - Inference failures
    /// - `MaskGenError::ShapeMismatch` for unexpected output shapes
    pub fn process_image(&mut self, image: &RgbImage) -> Result<(GrayImage, ProcessingTimings)> {
        self.initialize()?;

        let mut timings = ProcessingTimings::new();
        let start = Instant::now();

        let input = {
            let _span = span!(
                Level::DEBUG,
                "preprocessing",
                width = image.width(),
                height = image.height()
            )
            .entered();
            self.report_stage(ProcessingStage::Preprocessing, start);
            let stage_start = Instant::now();
            let tensor = ImagePreprocessor::preprocess_rgb(image, &self.preprocessing)?;
            timings.preprocessing_ms = stage_start.elapsed().as_millis() as u64;
            tensor
        };

        let output = {
            let _span = span!(Level::DEBUG, "inference", backend = self.backend.name()).entered();
            self.report_stage(ProcessingStage::Inference, start);
            let stage_start = Instant::now();
            let output = self.backend.infer(&input)?;
            timings.inference_ms = stage_start.elapsed().as_millis() as u64;
            output
        };

        let mask = {
            let _span = span!(Level::DEBUG, "postprocessing").entered();
            self.report_stage(ProcessingStage::MaskGeneration, start);
            let stage_start = Instant::now();
            let mask = MaskPostprocessor::process(
                &output,
                self.config.input_size as usize,
                self.config.rounding,
            )?;
            timings.postprocessing_ms = stage_start.elapsed().as_millis() as u64;
            mask
        };

        timings.total_ms = start.elapsed().as_millis() as u64;
        Ok((mask, timings))
    }

    /// Generate and write the mask for one image file
    ///
    /// # Errors
    /// - `MaskGenError::Decode` for unreadable images
    /// - `MaskGenError::Write` when the mask cannot be saved
    /// - Any error from [`MaskGenerator::process_image`]
    #[instrument(skip(self, image_path, masks_dir), fields(path = %image_path.display()))]
    pub fn process_file(&mut self, image_path: &Path, masks_dir: &Path) -> Result<MaskOutcome> {
        let start = Instant::now();

        self.report_stage(ProcessingStage::ImageLoading, start);
        let decode_start = Instant::now();
        let image = ImageIOService::load_image(image_path)?;
        let image_decode_ms = decode_start.elapsed().as_millis() as u64;

        let (mask, mut timings) = self.process_image(&image)?;
        timings.image_decode_ms = image_decode_ms;
        timings.model_load_ms = std::mem::take(&mut self.pending_model_load_ms);

        let mask_path = ImageIOService::mask_path_for(image_path, masks_dir, self.config.mask_format);
        self.report_stage(ProcessingStage::FileSaving, start);
        let encode_start = Instant::now();
        ImageIOService::save_mask(&mask, &mask_path, self.config.mask_format)?;
        timings.image_encode_ms = encode_start.elapsed().as_millis() as u64;

        timings.total_ms = start.elapsed().as_millis() as u64;
        debug!(
            mask = %mask_path.display(),
            total_ms = timings.total_ms,
            inference_ms = timings.inference_ms,
            "Mask written"
        );
        self.progress.report_completion(&timings);

        Ok(MaskOutcome {
            image_path: image_path.to_path_buf(),
            mask_path,
            timings,
        })
    }

    /// Generate masks for every image in the configured images directory
    ///
    /// # Errors
    /// - Images directory missing or unreadable
    /// - Masks directory cannot be created
    /// - Model loading failures
    /// - Under `FailurePolicy::FailFast`, the first per-image failure
    pub fn run(&mut self) -> Result<BatchReport> {
        let images_dir = self.config.images_dir();
        let masks_dir = self.config.masks_dir();
        let images = ImageIOService::find_images(&images_dir, &self.config.image_pattern)?;

        if images.is_empty() {
            warn!(
                dir = %images_dir.display(),
                pattern = %self.config.image_pattern,
                "No images found"
            );
        } else {
            info!(
                count = images.len(),
                dir = %images_dir.display(),
                "Found images to process"
            );
        }

        self.run_on(&images, &masks_dir)
    }

    /// Generate masks for `images`, in the given order, into `masks_dir`
    ///
    /// # Errors
    /// See [`MaskGenerator::run`].
    pub fn run_on(&mut self, images: &[PathBuf], masks_dir: &Path) -> Result<BatchReport> {
        let _span = info_span!("batch", images = images.len(), masks = %masks_dir.display()).entered();
        let batch_start = Instant::now();

        ImageIOService::ensure_dir(masks_dir)?;
        self.initialize()?;

        let mut report = BatchReport::default();
        for image_path in images {
            self.progress.report_batch_progress(&BatchProgressUpdate::new(
                report.success_count(),
                report.failure_count(),
                images.len(),
                image_path.display().to_string(),
                batch_start,
            ));

            info!("Generating mask for {}", image_path.display());
            match self.process_file(image_path, masks_dir) {
                Ok(outcome) => report.succeeded.push(outcome),
                Err(e) => {
                    if self.config.failure_policy == FailurePolicy::FailFast || !e.is_per_image() {
                        error!(path = %image_path.display(), "Aborting batch: {e}");
                        self.progress.finish_batch(report.success_count(), report.failure_count() + 1);
                        return Err(e);
                    }
                    error!(path = %image_path.display(), "Failed to generate mask: {e}");
                    self.progress
                        .report_error(ProcessingStage::BatchItemProcessing, &e.to_string());
                    report.failed.push(FailedImage {
                        image_path: image_path.clone(),
                        error: e,
                    });
                },
            }
        }

        report.total_ms = batch_start.elapsed().as_millis() as u64;
        self.progress
            .finish_batch(report.success_count(), report.failure_count());
        report.log_summary();
        Ok(report)
    }

    fn report_stage(&self, stage: ProcessingStage, start: Instant) {
        self.progress.report_progress(ProgressUpdate::new(stage, start));
    }
}
