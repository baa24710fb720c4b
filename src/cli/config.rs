//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::{CliMaskFormat, CliResizeFilter, CliRounding, GenerateArgs};
use crate::{
    config::{
        BackendType, ExecutionProvider, FailurePolicy, MaskFormat, MaskGenConfig,
        MaskGenConfigBuilder, RoundingMode,
    },
    utils::ResizeFilter,
};
use anyhow::{Context, Result};

/// Convert CLI arguments to a validated [`MaskGenConfig`]
///
/// Precedence: flags and environment, then the `--config` file, then defaults.
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    pub(crate) fn from_generate_args(args: &GenerateArgs) -> Result<MaskGenConfig> {
        let base = match &args.config {
            Some(path) => MaskGenConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config file {}", path.display()))?,
            None => MaskGenConfig::default(),
        };
        let mut builder = MaskGenConfigBuilder::from_config(base);

        if let Some(model) = &args.model {
            builder = builder.model_path(model);
        }
        if let Some(dataset) = &args.dataset {
            builder = builder.dataset_dir(dataset);
        }
        if let Some(images) = &args.images {
            builder = builder.images_dir(images);
        }
        if let Some(masks) = &args.masks {
            builder = builder.masks_dir(masks);
        }
        if let Some(pattern) = &args.pattern {
            builder = builder.image_pattern(pattern);
        }
        if let Some(format) = args.mask_format {
            builder = builder.mask_format(Self::mask_format(format));
        }
        if let Some(threads) = args.threads {
            builder = builder.intra_threads(threads);
        }
        if let Some(rounding) = args.rounding {
            builder = builder.rounding(Self::rounding(rounding));
        }
        if args.fail_fast {
            builder = builder.failure_policy(FailurePolicy::FailFast);
        }

        if args.dry_run {
            builder = builder
                .backend_type(BackendType::Mock)
                .execution_provider(ExecutionProvider::Cpu);
        } else if let Some(backend) = &args.backend {
            let (backend_type, provider) = BackendType::parse_provider_string(backend)?;
            builder = builder
                .backend_type(backend_type)
                .execution_provider(provider);
        }

        Ok(builder.build()?)
    }

    pub(crate) fn mask_format(format: CliMaskFormat) -> MaskFormat {
        match format {
            CliMaskFormat::Png => MaskFormat::Png,
            CliMaskFormat::Tiff => MaskFormat::Tiff,
        }
    }

    pub(crate) fn rounding(rounding: CliRounding) -> RoundingMode {
        match rounding {
            CliRounding::HalfToEven => RoundingMode::HalfToEven,
            CliRounding::HalfAwayFromZero => RoundingMode::HalfAwayFromZero,
        }
    }

    pub(crate) fn resize_filter(filter: CliResizeFilter) -> ResizeFilter {
        match filter {
            CliResizeFilter::Bilinear => ResizeFilter::Bilinear,
            CliResizeFilter::Triangle => ResizeFilter::Triangle,
            CliResizeFilter::Lanczos3 => ResizeFilter::Lanczos3,
        }
    }
}
