//! Synthetic inference backend
//!
//! Produces deterministic masks without a model file. Used by the test suite and
//! by `maskgen generate --dry-run` to exercise the I/O path of a dataset.

use crate::{
    config::{MaskGenConfig, MODEL_INPUT_SIZE},
    error::{MaskGenError, Result},
    inference::InferenceBackend,
};
use instant::Duration;
use ndarray::{Array2, Array4, ArrayD, IxDyn};
use std::sync::{Arc, Mutex};

/// Pattern written into the synthetic output
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockPattern {
    /// Soft disc centred in the frame
    Radial,
    /// Per-pixel mean of the input channels mapped back to [0, 1]
    InputLuma,
    /// Every value set to the given constant
    Constant(f32),
}

/// Mock backend for testing and dry runs
///
/// Clones share the same call history, so a test can keep a handle while the
/// driver owns the boxed backend.
#[derive(Debug, Clone)]
pub struct MockBackend {
    input_size: usize,
    output_shape: Vec<usize>,
    pattern: MockPattern,
    initialized: bool,
    fail_init: bool,
    /// 1-based inference calls that return an error
    failing_calls: Vec<usize>,
    call_history: Arc<Mutex<Vec<String>>>,
}

impl MockBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::with_input_size(MODEL_INPUT_SIZE)
    }

    /// Mock accepting `(1, size, size, 3)` and returning `(1, size, size, 1)`
    #[must_use]
    pub fn with_input_size(size: u32) -> Self {
        let size = size as usize;
        Self {
            input_size: size,
            output_shape: vec![1, size, size, 1],
            pattern: MockPattern::Radial,
            initialized: false,
            fail_init: false,
            failing_calls: Vec::new(),
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    #[must_use]
    pub fn pattern(mut self, pattern: MockPattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// Override the output tensor shape
    #[must_use]
    pub fn output_shape(mut self, shape: &[usize]) -> Self {
        self.output_shape = shape.to_vec();
        self
    }

    /// Make `initialize` fail
    #[must_use]
    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    /// Make the `n`-th inference call (1-based) fail
    #[must_use]
    pub fn failing_on_call(mut self, n: usize) -> Self {
        self.failing_calls.push(n);
        self
    }

    /// Method calls seen so far, in order
    pub fn call_history(&self) -> Vec<String> {
        self.call_history
            .lock()
            .map(|history| history.clone())
            .unwrap_or_default()
    }

    /// Number of `infer` calls seen so far
    pub fn infer_count(&self) -> usize {
        self.call_history()
            .iter()
            .filter(|call| call.as_str() == "infer")
            .count()
    }

    fn record_call(&self, method: &str) {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(method.to_string());
        }
    }

    fn generate_mask(&self, input: &Array4<f32>) -> Array2<f32> {
        let size = self.input_size;
        match self.pattern {
            MockPattern::Constant(value) => Array2::from_elem((size, size), value),
            MockPattern::InputLuma => Array2::from_shape_fn((size, size), |(y, x)| {
                let sum: f32 = (0..3)
                    .map(|c| input.get([0, y, x, c]).copied().unwrap_or(0.0))
                    .sum();
                (sum / 3.0 + 1.0) / 2.0
            }),
            MockPattern::Radial => {
                let center = size as f32 / 2.0;
                let radius = (size as f32 / 3.0).max(1.0);
                Array2::from_shape_fn((size, size), |(y, x)| {
                    let dx = x as f32 - center;
                    let dy = y as f32 - center;
                    let distance = (dx * dx + dy * dy).sqrt();
                    ((radius - distance) / radius).clamp(0.0, 1.0)
                })
            },
        }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for MockBackend {
    fn initialize(&mut self, _config: &MaskGenConfig) -> Result<Option<Duration>> {
        self.record_call("initialize");

        if self.fail_init {
            return Err(MaskGenError::model("Mock backend initialization failed"));
        }
        if self.initialized {
            return Ok(None);
        }

        self.initialized = true;
        Ok(Some(Duration::from_millis(0)))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<ArrayD<f32>> {
        self.record_call("infer");

        if !self.initialized {
            return Err(MaskGenError::inference("Mock backend not initialized"));
        }

        let expected = self.input_shape();
        if input.dim() != expected {
            return Err(MaskGenError::inference(format!(
                "Mock backend expected input {:?}, got {:?}",
                expected,
                input.dim()
            )));
        }

        if self.failing_calls.contains(&self.infer_count()) {
            return Err(MaskGenError::inference("Mock backend inference failed"));
        }

        let mask = self.generate_mask(input);
        let shape = IxDyn(&self.output_shape);
        if self.output_shape.iter().product::<usize>() == mask.len() {
            ArrayD::from_shape_vec(shape, mask.iter().copied().collect())
                .map_err(|e| MaskGenError::inference(format!("Failed to shape mock output: {e}")))
        } else {
            Ok(ArrayD::from_elem(shape, 0.5))
        }
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        (1, self.input_size, self.input_size, 3)
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(size: usize, value: f32) -> Array4<f32> {
        Array4::from_elem((1, size, size, 3), value)
    }

    #[test]
    fn test_infer_requires_initialization() {
        let mut backend = MockBackend::new();
        assert!(backend.infer(&input(256, 0.0)).is_err());

        backend.initialize(&MaskGenConfig::default()).unwrap();
        assert!(backend.is_initialized());
        assert!(backend.infer(&input(256, 0.0)).is_ok());
    }

    #[test]
    fn test_second_initialize_reports_no_load_time() {
        let mut backend = MockBackend::new();
        let config = MaskGenConfig::default();
        assert!(backend.initialize(&config).unwrap().is_some());
        assert!(backend.initialize(&config).unwrap().is_none());
    }

    #[test]
    fn test_default_output_shape() {
        let mut backend = MockBackend::new();
        backend.initialize(&MaskGenConfig::default()).unwrap();
        let output = backend.infer(&input(256, 0.0)).unwrap();
        assert_eq!(output.shape(), &[1, 256, 256, 1]);

        let center = output[[0, 128, 128, 0]];
        let corner = output[[0, 0, 0, 0]];
        assert!(center > 0.9);
        assert!(corner.abs() < f32::EPSILON);
    }

    #[test]
    fn test_input_luma_pattern() {
        let mut backend = MockBackend::new().pattern(MockPattern::InputLuma);
        backend.initialize(&MaskGenConfig::default()).unwrap();

        let output = backend.infer(&input(256, 1.0)).unwrap();
        assert!(output.iter().all(|&v| (v - 1.0).abs() < 1e-6));

        let output = backend.infer(&input(256, -1.0)).unwrap();
        assert!(output.iter().all(|&v| v.abs() < 1e-6));
    }

    #[test]
    fn test_rejects_wrong_input_shape() {
        let mut backend = MockBackend::new();
        backend.initialize(&MaskGenConfig::default()).unwrap();
        assert!(backend.infer(&input(128, 0.0)).is_err());
    }

    #[test]
    fn test_failure_injection_and_shared_history() {
        let handle = MockBackend::new().failing_on_call(2);
        let mut backend = handle.clone();
        backend.initialize(&MaskGenConfig::default()).unwrap();

        assert!(backend.infer(&input(256, 0.0)).is_ok());
        assert!(backend.infer(&input(256, 0.0)).is_err());
        assert!(backend.infer(&input(256, 0.0)).is_ok());

        assert_eq!(handle.infer_count(), 3);
        assert_eq!(handle.call_history().first().map(String::as_str), Some("initialize"));
    }

    #[test]
    fn test_custom_output_shape() {
        let mut backend = MockBackend::new().output_shape(&[256, 256]);
        backend.initialize(&MaskGenConfig::default()).unwrap();
        assert_eq!(backend.infer(&input(256, 0.0)).unwrap().shape(), &[256, 256]);

        let mut backend = MockBackend::new().output_shape(&[1, 128, 128, 1]);
        backend.initialize(&MaskGenConfig::default()).unwrap();
        assert_eq!(
            backend.infer(&input(256, 0.0)).unwrap().shape(),
            &[1, 128, 128, 1]
        );
    }

    #[test]
    fn test_failing_init() {
        let mut backend = MockBackend::new().failing_init();
        assert!(backend.initialize(&MaskGenConfig::default()).is_err());
        assert!(!backend.is_initialized());
    }
}
