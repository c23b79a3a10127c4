//! Command-line interface definition.

use camino::Utf8PathBuf;
use clap::Parser;

/// Manage model paths and symlinks for locally installed AI tools.
#[derive(Parser, Debug)]
#[command(name = "model2library", version, about)]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, default_value = "configs/model_paths.yaml")]
    pub config: Utf8PathBuf,

    /// Simulate actions without making changes
    #[arg(long)]
    pub dry_run: bool,

    /// Process only the named application (default: all)
    #[arg(long)]
    pub app: Option<String>,

    /// Print variable usage analysis and exit
    #[arg(long)]
    pub analyze_variables: bool,

    /// Write a markdown report documenting the configuration and exit
    #[arg(long, value_name = "PATH")]
    pub document: Option<Utf8PathBuf>,

    /// Directory for log files
    #[arg(long, default_value = "logs")]
    pub log_dir: Utf8PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}
