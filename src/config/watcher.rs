//! File watcher for the user configuration source.
//!
//! Watches the directory that holds the user file (editors often save by
//! writing a temporary file and renaming it over the original, which a watch
//! on the file itself would miss) and reports changes to that one file.
//! Uses debouncing to coalesce rapid writes into a single "last write" event.

use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{DebouncedEvent, DebouncedEventKind, Debouncer, new_debouncer};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Events delivered to the watch callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// The watched file was written, created, replaced or removed.
    Changed(PathBuf),
    /// The watch backend reported an error.
    Error(String),
}

/// Configuration for the file watcher.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Debounce duration for coalescing rapid changes.
    pub debounce_duration: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_duration: Duration::from_millis(500),
        }
    }
}

/// A running watch. Dropping it stops the watch and ends the worker thread.
pub struct SourceWatch {
    path: PathBuf,
    _debouncer: Debouncer<RecommendedWatcher>,
}

impl SourceWatch {
    /// The watched file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for SourceWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceWatch").field("path", &self.path).finish()
    }
}

/// Start watching a single file.
///
/// `on_event` runs on a dedicated worker thread, once per debounced batch
/// that touches the file, and once per backend error.
pub fn watch_file<F>(
    path: &Path,
    config: &WatcherConfig,
    on_event: F,
) -> notify::Result<SourceWatch>
where
    F: Fn(WatchEvent) + Send + 'static,
{
    let (notify_tx, notify_rx) = mpsc::channel();
    let mut debouncer = new_debouncer(config.debounce_duration, notify_tx)?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .ok_or_else(|| notify::Error::path_not_found().add_path(path.to_path_buf()))?;

    debouncer
        .watcher()
        .watch(&dir, RecursiveMode::NonRecursive)?;
    info!("Watching configuration file: {}", path.display());

    let target = path.to_path_buf();
    std::thread::Builder::new()
        .name("config-watch".to_string())
        .spawn(move || process_notify_events(notify_rx, &target, &file_name, on_event))
        .map_err(notify::Error::io)?;

    Ok(SourceWatch {
        path: path.to_path_buf(),
        _debouncer: debouncer,
    })
}

/// Process events from the debouncer until it is dropped.
fn process_notify_events<F>(
    rx: mpsc::Receiver<Result<Vec<DebouncedEvent>, notify::Error>>,
    target: &Path,
    file_name: &OsString,
    on_event: F,
) where
    F: Fn(WatchEvent),
{
    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                if touches_file(&events, file_name) {
                    debug!("Configuration file change detected: {}", target.display());
                    on_event(WatchEvent::Changed(target.to_path_buf()));
                }
            }
            Ok(Err(e)) => {
                error!("File watcher error: {}", e);
                on_event(WatchEvent::Error(e.to_string()));
            }
            Err(_) => {
                // Debouncer dropped
                info!("Configuration watcher stopped: {}", target.display());
                return;
            }
        }
    }
}

/// Whether any debounced event in the batch refers to the watched file.
fn touches_file(events: &[DebouncedEvent], file_name: &OsString) -> bool {
    events.iter().any(|event| {
        matches!(
            event.kind,
            DebouncedEventKind::Any | DebouncedEventKind::AnyContinuous
        ) && event.path.file_name() == Some(file_name.as_os_str())
    })
}
