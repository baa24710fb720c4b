//! Mask generation CLI tool
//!
//! `maskgen` with no subcommand generates masks for the default dataset layout.

use super::config::CliConfigBuilder;
use crate::{
    inference::available_backends,
    processor::MaskGenerator,
    report::{ComparisonReport, MaskSet, DEFAULT_REPORT_NAME, DEFAULT_REPORT_TITLE},
    services::{BatchProgressUpdate, ProcessingStage, ProgressReporter, ProgressUpdate},
    tracing_config::{init_cli_tracing, TracingFormat},
    types::ProcessingTimings,
};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use instant::Instant;
use std::path::PathBuf;
use tracing::{info, warn};

/// Batch segmentation mask generator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "maskgen")]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Arguments for the implicit `generate` command
    #[command(flatten)]
    pub generate: GenerateArgs,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t = CliLogFormat::Console, global = true)]
    pub log_format: CliLogFormat,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate one mask per input image (default)
    Generate(GenerateArgs),
    /// Render masks from one or more directories as overlays in an HTML report
    Compare(CompareArgs),
    /// List compiled-in backends and execution providers
    Backends,
}

#[derive(Args, Debug, Default, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct GenerateArgs {
    /// Segmentation model (.tflite or .onnx)
    #[arg(short, long, env = "MASKGEN_MODEL", value_name = "PATH")]
    pub model: Option<PathBuf>,

    /// Dataset root containing images/ and masks/
    #[arg(short, long, env = "MASKGEN_DATASET", value_name = "DIR")]
    pub dataset: Option<PathBuf>,

    /// Input images directory [default: <dataset>/images]
    #[arg(long, value_name = "DIR")]
    pub images: Option<PathBuf>,

    /// Output masks directory [default: <dataset>/masks]
    #[arg(long, value_name = "DIR")]
    pub masks: Option<PathBuf>,

    /// File name pattern for input images [default: *.jpg]
    #[arg(long, value_name = "GLOB")]
    pub pattern: Option<String>,

    /// Mask file format [default: png]
    #[arg(long, value_enum)]
    pub mask_format: Option<CliMaskFormat>,

    /// Backend and execution provider as backend[:provider] (e.g. tract, onnx:cuda)
    #[arg(short, long, value_name = "BACKEND")]
    pub backend: Option<String>,

    /// Number of intra-op threads (0 = auto-detect)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Rounding rule for 8-bit quantization [default: half-to-even]
    #[arg(long, value_enum)]
    pub rounding: Option<CliRounding>,

    /// Resampling filter used before inference
    #[arg(long, value_enum, default_value_t = CliResizeFilter::Bilinear)]
    pub resize_filter: CliResizeFilter,

    /// Stop at the first image that fails
    #[arg(long)]
    pub fail_fast: bool,

    /// JSON configuration file (flags and environment take precedence)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Run the pipeline with a synthetic backend instead of the model
    #[arg(long)]
    pub dry_run: bool,

    /// Show a progress bar
    #[arg(long)]
    pub progress: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CompareArgs {
    /// Directory with the input .jpg/.jpeg images
    #[arg(long, value_name = "DIR")]
    pub images: PathBuf,

    /// Mask directory to compare, as LABEL=DIR (repeatable)
    #[arg(long = "masks", value_name = "LABEL=DIR", required = true, num_args = 1..)]
    pub masks: Vec<MaskSet>,

    /// Report output directory
    #[arg(short, long, value_name = "DIR", default_value = "reports")]
    pub output: PathBuf,

    /// Page title
    #[arg(long, default_value = DEFAULT_REPORT_TITLE)]
    pub title: String,

    /// HTML file name without extension
    #[arg(long, default_value = DEFAULT_REPORT_NAME)]
    pub name: String,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliMaskFormat {
    Png,
    Tiff,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliRounding {
    HalfToEven,
    HalfAwayFromZero,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug, Default)]
pub enum CliResizeFilter {
    #[default]
    Bilinear,
    Triangle,
    Lanczos3,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliLogFormat {
    Console,
    Compact,
    /// Requires the `tracing-json` feature
    Json,
}

impl TryFrom<CliLogFormat> for TracingFormat {
    type Error = anyhow::Error;

    fn try_from(format: CliLogFormat) -> Result<Self> {
        match format {
            CliLogFormat::Console => Ok(TracingFormat::Console),
            CliLogFormat::Compact => Ok(TracingFormat::Compact),
            #[cfg(feature = "tracing-json")]
            CliLogFormat::Json => Ok(TracingFormat::Json),
            #[cfg(not(feature = "tracing-json"))]
            CliLogFormat::Json => {
                anyhow::bail!("JSON logging not available. Rebuild with --features tracing-json")
            },
        }
    }
}

/// Main entry point for the CLI application
///
/// # Errors
/// - Invalid arguments or configuration
/// - Model loading failures
/// - Any image failing to produce a mask
pub fn main() -> Result<()> {
    let cli = Cli::parse();

    init_cli_tracing(cli.verbose, cli.log_format.try_into()?)
        .context("Failed to initialize tracing")?;

    match &cli.command {
        None => run_generate(&cli.generate),
        Some(Commands::Generate(args)) => run_generate(args),
        Some(Commands::Compare(args)) => run_compare(args),
        Some(Commands::Backends) => {
            show_backends();
            Ok(())
        },
    }
}

fn run_generate(args: &GenerateArgs) -> Result<()> {
    let config = CliConfigBuilder::from_generate_args(args).context("Invalid configuration")?;

    info!("Starting mask generation");
    info!(
        "Backend: {}, Provider: {}",
        config.backend_type, config.execution_provider
    );
    if args.dry_run {
        warn!("Dry run: masks come from a synthetic backend, not the model");
    } else {
        info!("Model: {}", config.model_path.display());
    }
    info!("Images: {}", config.images_dir().display());
    info!("Masks: {}", config.masks_dir().display());

    let mut generator = MaskGenerator::new(config)
        .context("Failed to create mask generator")?
        .with_resize_filter(CliConfigBuilder::resize_filter(args.resize_filter));
    if args.progress {
        generator = generator.with_progress_reporter(Box::new(IndicatifProgressReporter::new()));
    }

    let start_time = Instant::now();
    let report = generator.run().context("Mask generation aborted")?;

    info!(
        "Generated {} mask(s) in {:.2}s (avg {:.0}ms per image)",
        report.success_count(),
        start_time.elapsed().as_secs_f64(),
        report.average_ms()
    );

    if !report.is_success() {
        anyhow::bail!(
            "{} of {} image(s) failed",
            report.failure_count(),
            report.total()
        );
    }
    Ok(())
}

fn run_compare(args: &CompareArgs) -> Result<()> {
    let report = args
        .masks
        .iter()
        .cloned()
        .fold(
            ComparisonReport::new(&args.images, &args.output),
            ComparisonReport::with_mask_set,
        )
        .title(args.title.clone())
        .report_name(args.name.clone());

    let summary = report
        .generate()
        .context("Failed to generate comparison report")?;

    info!(
        "Report written to {} ({} entries, {} skipped)",
        summary.html_path.display(),
        summary.rendered,
        summary.skipped
    );
    Ok(())
}

fn show_backends() {
    println!("Backends compiled into this build:");
    for backend in available_backends() {
        println!("  - {backend}");
    }

    #[cfg(feature = "onnx")]
    {
        println!();
        println!("ONNX Runtime execution providers:");
        for (name, available, description) in crate::backends::OnnxBackend::list_providers() {
            let status = if available { "available" } else { "unavailable" };
            println!("  - {name} ({status}): {description}");
        }
    }
}

/// Progress bar driven by the batch loop
struct IndicatifProgressReporter {
    bar: ProgressBar,
}

impl IndicatifProgressReporter {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        bar.set_style(style);
        Self { bar }
    }
}

impl ProgressReporter for IndicatifProgressReporter {
    fn report_progress(&self, _update: ProgressUpdate) {}

    fn report_completion(&self, _timings: &ProcessingTimings) {
        self.bar.inc(1);
    }

    fn report_error(&self, _stage: ProcessingStage, _error: &str) {
        self.bar.inc(1);
    }

    fn report_batch_progress(&self, update: &BatchProgressUpdate) {
        self.bar.set_length(update.items_total as u64);
        self.bar.set_message(update.current_item_name.clone());
    }

    fn finish_batch(&self, succeeded: usize, failed: usize) {
        self.bar
            .finish_with_message(format!("Completed! Generated: {succeeded}, Failed: {failed}"));
    }
}
