//! layered-config CLI
//!
//! Loads module defaults, the user settings file and their merged view, and
//! prints them.

use anyhow::{Result, bail};
use clap::Parser;
use layered_config::cli::overlay::OverlayArgs;
use layered_config::cli::show::{GetArgs, Layer, ShowArgs};
use layered_config::cli::{Cli, Command};
use layered_config::config::{ConfigPath, ConfigStore, ModuleSource, OverlayTarget};
use layered_config::format::render;
use layered_config::logging;
use std::sync::Arc;
use tracing::{debug, info};

fn open_store(cli: &Cli, watch: bool) -> Result<ConfigStore> {
    let options = cli.store_options(watch);
    debug!("Base directory: {}", options.base_dir.display());
    let modules = cli
        .module_source()?
        .map(|m| Arc::new(m) as Arc<dyn ModuleSource>);
    Ok(ConfigStore::open(options, modules))
}

fn run_show(store: &ConfigStore, args: &ShowArgs) {
    let node = match args.layer {
        Layer::Global => store.global(),
        Layer::Default => store.default_config(),
        Layer::User => store.user_config(),
    };
    println!("{}", render(&node, args.format.0));
}

fn run_get(store: &ConfigStore, args: &GetArgs) -> Result<()> {
    let path = ConfigPath::parse(&args.path);
    let global = store.global();
    let node = global.at_path(&path);
    if node.is_absent() {
        debug!("No value at '{}'", path);
        return Ok(());
    }
    println!("{}", render(node, args.format.0));
    Ok(())
}

fn run_overlay(store: &ConfigStore, args: &OverlayArgs) -> Result<()> {
    let global = store.global();
    let target = if args.detached {
        OverlayTarget::Detached
    } else {
        OverlayTarget::Tree(&global)
    };
    let merged = store.apply_from_directory(&args.dir, target, args.recursive)?;
    println!("{}", render(&merged, args.format.0));
    Ok(())
}

async fn run_watch(store: &ConfigStore) -> Result<()> {
    match store.user_source_path() {
        Some(path) if store.is_watching() => info!("Watching {}", path.display()),
        Some(path) => bail!("Could not watch {}", path.display()),
        None => bail!("No user configuration file to watch"),
    }

    let mut changes = store.changes();
    println!("{}", render(&store.global(), Default::default()));
    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let generation = *changes.borrow_and_update();
                info!(generation, "Configuration changed");
                println!("{}", render(&store.global(), Default::default()));
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on --log option
    logging::init(&cli.log, cli.verbose)?;

    match cli.command {
        Some(Command::Show(ref args)) => run_show(&open_store(&cli, false)?, args),
        Some(Command::Get(ref args)) => run_get(&open_store(&cli, false)?, args)?,
        Some(Command::Overlay(ref args)) => run_overlay(&open_store(&cli, false)?, args)?,
        Some(Command::Watch) => run_watch(&open_store(&cli, true)?).await?,
        None => run_show(&open_store(&cli, false)?, &ShowArgs::default()),
    }
    Ok(())
}
