//! Result types for mask generation

use crate::error::MaskGenError;
use serde::Serialize;
use std::path::PathBuf;

/// Per-image stage timings in milliseconds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessingTimings {
    /// Model loading, non-zero only for the image that triggered initialization
    pub model_load_ms: u64,
    pub image_decode_ms: u64,
    pub preprocessing_ms: u64,
    pub inference_ms: u64,
    pub postprocessing_ms: u64,
    pub image_encode_ms: u64,
    pub total_ms: u64,
}

/// Share of the total time spent in each stage
#[derive(Debug, Clone, Default)]
pub struct TimingBreakdown {
    pub model_load_pct: f64,
    pub decode_pct: f64,
    pub preprocessing_pct: f64,
    pub inference_pct: f64,
    pub postprocessing_pct: f64,
    pub encode_pct: f64,
}

impl ProcessingTimings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Percentages of `total_ms`; all zero when the total is zero
    #[must_use]
    pub fn breakdown_percentages(&self) -> TimingBreakdown {
        if self.total_ms == 0 {
            return TimingBreakdown::default();
        }
        let total = self.total_ms as f64;
        let pct = |ms: u64| ms as f64 / total * 100.0;
        TimingBreakdown {
            model_load_pct: pct(self.model_load_ms),
            decode_pct: pct(self.image_decode_ms),
            preprocessing_pct: pct(self.preprocessing_ms),
            inference_pct: pct(self.inference_ms),
            postprocessing_pct: pct(self.postprocessing_ms),
            encode_pct: pct(self.image_encode_ms),
        }
    }

    /// Add another image's timings into this one
    pub fn accumulate(&mut self, other: &Self) {
        self.model_load_ms += other.model_load_ms;
        self.image_decode_ms += other.image_decode_ms;
        self.preprocessing_ms += other.preprocessing_ms;
        self.inference_ms += other.inference_ms;
        self.postprocessing_ms += other.postprocessing_ms;
        self.image_encode_ms += other.image_encode_ms;
        self.total_ms += other.total_ms;
    }
}

/// A mask written for one input image
#[derive(Debug, Clone, Serialize)]
pub struct MaskOutcome {
    pub image_path: PathBuf,
    pub mask_path: PathBuf,
    pub timings: ProcessingTimings,
}

/// An input image that could not be turned into a mask
#[derive(Debug)]
pub struct FailedImage {
    pub image_path: PathBuf,
    pub error: MaskGenError,
}

/// Summary of a batch run, in processing order
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<MaskOutcome>,
    pub failed: Vec<FailedImage>,
    pub total_ms: u64,
}

impl BatchReport {
    /// Number of images attempted
    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    #[must_use]
    pub fn success_count(&self) -> usize {
        self.succeeded.len()
    }

    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }

    /// True when no image failed (an empty batch counts as success)
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Sum of the per-image timings of successful images
    #[must_use]
    pub fn aggregate_timings(&self) -> ProcessingTimings {
        let mut total = ProcessingTimings::new();
        for outcome in &self.succeeded {
            total.accumulate(&outcome.timings);
        }
        total
    }

    /// Mean wall time per successful image, in milliseconds
    #[must_use]
    pub fn average_ms(&self) -> f64 {
        if self.succeeded.is_empty() {
            0.0
        } else {
            self.aggregate_timings().total_ms as f64 / self.succeeded.len() as f64
        }
    }

    /// Log a summary of the run
    pub fn log_summary(&self) {
        tracing::info!(
            processed = self.success_count(),
            failed = self.failure_count(),
            total_ms = self.total_ms,
            "Batch processing summary"
        );
        let timings = self.aggregate_timings();
        let breakdown = timings.breakdown_percentages();
        tracing::debug!(
            "Stage totals: decode {}ms ({:.1}%), preprocess {}ms ({:.1}%), inference {}ms ({:.1}%), postprocess {}ms ({:.1}%), encode {}ms ({:.1}%)",
            timings.image_decode_ms,
            breakdown.decode_pct,
            timings.preprocessing_ms,
            breakdown.preprocessing_pct,
            timings.inference_ms,
            breakdown.inference_pct,
            timings.postprocessing_ms,
            breakdown.postprocessing_pct,
            timings.image_encode_ms,
            breakdown.encode_pct
        );
        for failure in &self.failed {
            tracing::warn!(
                path = %failure.image_path.display(),
                "Failed: {}",
                failure.error
            );
        }
    }
}
