//! Progress reporting service
//!
//! Separates progress reporting from the pipeline so that the CLI can draw a
//! progress bar while library users stay silent.

use crate::types::ProcessingTimings;
use instant::Instant;

/// Stages of mask generation for a single image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Initializing backend and loading model
    Initialization,
    /// Loading and decoding input image
    ImageLoading,
    /// Resizing and normalizing image for inference
    Preprocessing,
    /// Running model inference
    Inference,
    /// Converting output tensor to mask
    MaskGeneration,
    /// Writing mask to disk
    FileSaving,
    /// Processing completed
    Completed,
    /// Processing individual item in batch
    BatchItemProcessing,
}

impl ProcessingStage {
    /// Get a human-readable description of the processing stage
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            ProcessingStage::Initialization => "Initializing model and backend",
            ProcessingStage::ImageLoading => "Loading input image",
            ProcessingStage::Preprocessing => "Preprocessing image",
            ProcessingStage::Inference => "Running inference",
            ProcessingStage::MaskGeneration => "Generating segmentation mask",
            ProcessingStage::FileSaving => "Saving mask",
            ProcessingStage::Completed => "Processing completed",
            ProcessingStage::BatchItemProcessing => "Processing batch item",
        }
    }

    /// Typical progress percentage at the start of this stage
    #[must_use]
    pub fn progress_percentage(self) -> u8 {
        match self {
            ProcessingStage::Initialization => 5,
            ProcessingStage::ImageLoading => 10,
            ProcessingStage::Preprocessing => 25,
            ProcessingStage::Inference => 70,
            ProcessingStage::MaskGeneration => 90,
            ProcessingStage::FileSaving => 99,
            ProcessingStage::Completed => 100,
            ProcessingStage::BatchItemProcessing => 50,
        }
    }
}

/// Progress update containing stage and timing information
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub stage: ProcessingStage,
    /// Progress percentage (0-100)
    pub progress: u8,
    pub description: String,
    /// Elapsed time since processing started (milliseconds)
    pub elapsed_ms: u64,
}

impl ProgressUpdate {
    #[must_use]
    pub fn new(stage: ProcessingStage, start_time: Instant) -> Self {
        Self {
            progress: stage.progress_percentage(),
            description: stage.description().to_string(),
            elapsed_ms: start_time.elapsed().as_millis() as u64,
            stage,
        }
    }
}

/// Statistics for a batch in flight
#[derive(Debug, Clone)]
pub struct BatchProgressUpdate {
    pub items_completed: usize,
    pub items_total: usize,
    pub items_failed: usize,
    /// Path of the item about to be processed
    pub current_item_name: String,
    /// Processing rate in items per second
    pub processing_rate: f64,
    /// Estimated time remaining in seconds
    pub eta_seconds: Option<u64>,
}

impl BatchProgressUpdate {
    /// Build batch statistics from counters and the batch start time
    #[must_use]
    pub fn new(
        items_completed: usize,
        items_failed: usize,
        items_total: usize,
        current_item_name: String,
        batch_start: Instant,
    ) -> Self {
        let elapsed_seconds = batch_start.elapsed().as_secs_f64();
        let done = items_completed + items_failed;
        let processing_rate = if elapsed_seconds > 0.0 && done > 0 {
            done as f64 / elapsed_seconds
        } else {
            0.0
        };
        let remaining = items_total.saturating_sub(done);
        let eta_seconds = if processing_rate > 0.0 {
            Some((remaining as f64 / processing_rate) as u64)
        } else {
            None
        };

        Self {
            items_completed,
            items_total,
            items_failed,
            current_item_name,
            processing_rate,
            eta_seconds,
        }
    }
}

/// Trait for reporting progress during mask generation
pub trait ProgressReporter: Send + Sync {
    /// Report a stage change for the current image
    fn report_progress(&self, update: ProgressUpdate);

    /// Report that an image finished with the given timings
    fn report_completion(&self, timings: &ProcessingTimings);

    /// Report an error during processing
    fn report_error(&self, stage: ProcessingStage, error: &str);

    /// Report batch progress before each item
    fn report_batch_progress(&self, update: &BatchProgressUpdate) {
        let _ = update;
    }

    /// Called once after the last item of a batch
    fn finish_batch(&self, succeeded: usize, failed: usize) {
        let _ = (succeeded, failed);
    }
}

/// No-op progress reporter that discards all progress updates
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report_progress(&self, _update: ProgressUpdate) {}

    fn report_completion(&self, _timings: &ProcessingTimings) {}

    fn report_error(&self, _stage: ProcessingStage, _error: &str) {}
}

/// Progress reporter that writes to the log
pub struct ConsoleProgressReporter {
    verbose: bool,
}

impl ConsoleProgressReporter {
    /// `verbose` adds elapsed times and per-stage timings
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        if self.verbose {
            log::debug!(
                "[{}%] {} ({}ms elapsed)",
                update.progress,
                update.description,
                update.elapsed_ms
            );
        }
    }

    fn report_completion(&self, timings: &ProcessingTimings) {
        log::debug!("Mask generated in {}ms", timings.total_ms);

        if self.verbose {
            log::debug!("  - Image decode: {}ms", timings.image_decode_ms);
            log::debug!("  - Preprocessing: {}ms", timings.preprocessing_ms);
            log::debug!("  - Inference: {}ms", timings.inference_ms);
            log::debug!("  - Postprocessing: {}ms", timings.postprocessing_ms);
            log::debug!("  - Image encode: {}ms", timings.image_encode_ms);
        }
    }

    fn report_error(&self, stage: ProcessingStage, error: &str) {
        log::error!("Error during {}: {}", stage.description(), error);
    }

    fn report_batch_progress(&self, update: &BatchProgressUpdate) {
        if self.verbose {
            log::debug!(
                "[{}/{}] {} ({:.2} items/s)",
                update.items_completed + update.items_failed + 1,
                update.items_total,
                update.current_item_name,
                update.processing_rate
            );
        }
    }
}
