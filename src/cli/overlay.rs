//! Overlay subcommand for layered-config CLI
//!
//! Folds a directory of JSON files over the global configuration and prints
//! the result. The store itself is left unchanged.

use super::show::FormatArg;
use clap::Args;
use std::path::PathBuf;

/// Arguments for the overlay subcommand
#[derive(Args, Debug)]
pub struct OverlayArgs {
    /// Directory of overlay files, relative to the base directory
    #[arg(value_name = "DIR")]
    pub dir: PathBuf,

    /// Include files in subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Start from an empty tree instead of the global configuration
    #[arg(long)]
    pub detached: bool,

    /// Output format: json (default) or flat
    #[arg(short, long, default_value = "json", value_name = "FORMAT")]
    pub format: FormatArg,
}
