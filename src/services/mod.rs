//! Services separating file I/O and progress reporting from the pipeline

pub mod io;
pub mod progress;

pub use io::ImageIOService;
pub use progress::{
    BatchProgressUpdate, ConsoleProgressReporter, NoOpProgressReporter, ProcessingStage,
    ProgressReporter, ProgressUpdate,
};
