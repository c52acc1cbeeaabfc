//! Command-line definition.

use clap::Parser;
use std::path::PathBuf;

/// Discrete-event simulator for leak detection and repair programs on oil
/// and gas infrastructure.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,

    /// Parameter files (YAML or JSON), layered global -> program -> method
    #[arg(required = true)]
    pub parameter_files: Vec<PathBuf>,

    /// Override the input directory from the parameter files
    #[arg(long)]
    pub input_dir: Option<PathBuf>,

    /// Override the output directory from the parameter files
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}
