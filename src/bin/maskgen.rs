//! maskgen CLI tool
//!
//! Command-line interface for generating segmentation masks over a dataset
//! with the Tract or ONNX Runtime backends.

#[cfg(feature = "cli")]
use maskgen::cli;

#[cfg(feature = "cli")]
fn main() -> anyhow::Result<()> {
    cli::main()
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}
