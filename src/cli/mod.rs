//! CLI command definitions for layered-config
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod overlay;
pub mod show;

use crate::config::{ModuleInfo, StaticModules, StoreOptions};
use crate::logging::LogTarget;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use overlay::OverlayArgs;
use show::{GetArgs, ShowArgs};
use std::path::{Path, PathBuf};

/// Inspect layered JSON configuration
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Base execution directory (default: $LAYERED_CONFIG_BASE_DIR, then the executable's directory)
    #[arg(short, long, global = true, value_name = "DIR")]
    pub base_dir: Option<PathBuf>,

    /// Explicit user settings file (default: settings.json in the base directory)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub user: Option<PathBuf>,

    /// Module defaults file; repeat in load order, the last one is the entry module
    #[arg(short, long = "module", global = true, value_name = "FILE")]
    pub modules: Vec<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: LogTarget,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print a configuration layer (default if no subcommand given)
    Show(ShowArgs),

    /// Print the value at a path in the global configuration
    Get(GetArgs),

    /// Fold a directory of overlay files over the global configuration
    Overlay(OverlayArgs),

    /// Print the global configuration every time the user file changes
    Watch,
}

impl Cli {
    /// Store options from the command line, falling back to the environment.
    pub fn store_options(&self, watch: bool) -> StoreOptions {
        let mut options = StoreOptions::discover();
        if let Some(ref dir) = self.base_dir {
            options.base_dir = crate::paths::resolve_base_dir(Some(dir));
        }
        if let Some(ref user) = self.user {
            options.user_file = Some(user.clone());
        }
        options.with_watch(watch)
    }

    /// Modules named on the command line.
    pub fn module_source(&self) -> Result<Option<StaticModules>> {
        if self.modules.is_empty() {
            return Ok(None);
        }
        let last = self.modules.len() - 1;
        let modules = self
            .modules
            .iter()
            .enumerate()
            .map(|(i, path)| {
                let module = module_from_file(path)?;
                Ok(if i == last { module.entry() } else { module })
            })
            .collect::<Result<StaticModules>>()?;
        Ok(Some(modules))
    }
}

/// A module whose only resource is the given defaults file.
fn module_from_file(path: &Path) -> Result<ModuleInfo> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read module defaults {}", path.display()))?;
    let id = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(ModuleInfo::new(id).with_defaults(text))
}
