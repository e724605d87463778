//! Process-wide configuration store.
//!
//! Holds three layers:
//! - **Default**: module defaults folded in load order (entry module last),
//!   then the base directory's `config.d/` files
//! - **User**: the parsed user settings file, or absent
//! - **Global**: `merge(User, Default)`, computed lazily and memoized
//!
//! ## Concurrency
//! Writers (`set_*`, overlays onto a live layer, `reload_*`, file-watch
//! reloads) are serialized by a single write lock. Each write swaps its input
//! layer, bumps the generation and clears the Global memo inside one critical
//! section, so no reader can pair a new input with a stale memo. Global is
//! rebuilt by readers outside the write lock; a rebuild is only published if
//! no write happened while it ran, otherwise it is returned to its caller and
//! discarded.
//!
//! Change notifications are delivered while the write lock is held. Callbacks
//! may read the store, but must not call its write operations synchronously;
//! use [`ConfigStore::changes`] or hand the work to another thread instead.

use super::loader::{
    ModuleSource, SOURCE_EXTENSIONS, list_candidate_sources, locate_user_source, scan_directory,
};
use super::merge::{merge, merge_owned};
use super::source::{SourceFingerprint, fingerprint, parse_source, read_source};
use super::watcher::{SourceWatch, WatchEvent, WatcherConfig, watch_file};
use crate::error::{ConfigError, Result};
use crate::node::ConfigNode;
use crate::paths::{USER_FILE_ENV, resolve_against, resolve_base_dir};
use crate::subscriptions::{ConfigChanged, SubscriptionId, SubscriptionManager};
use arc_swap::ArcSwapOption;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{
    Arc, Mutex, MutexGuard, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Default base name of the user settings file.
pub const DEFAULT_USER_BASE_NAME: &str = "settings";

/// Default name of the base-directory defaults folder.
pub const DEFAULT_DEFAULTS_DIR: &str = "config.d";

static PROCESS_STORE: OnceLock<ConfigStore> = OnceLock::new();

/// Options controlling where the store looks for its sources.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Base execution directory; relative paths resolve against it.
    pub base_dir: PathBuf,
    /// User file base name, matched case-insensitively.
    pub user_base_name: String,
    /// Accepted user file extensions.
    pub user_extensions: Vec<String>,
    /// Explicit user file. Bypasses the naming convention.
    pub user_file: Option<PathBuf>,
    /// Directory under `base_dir` whose files extend Default.
    pub defaults_dir_name: Option<String>,
    /// Attach a file watch to the user source.
    pub watch: bool,
    /// Debounce window for the file watch.
    pub debounce: Duration,
}

impl StoreOptions {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            user_base_name: DEFAULT_USER_BASE_NAME.to_string(),
            user_extensions: SOURCE_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            user_file: None,
            defaults_dir_name: Some(DEFAULT_DEFAULTS_DIR.to_string()),
            watch: true,
            debounce: WatcherConfig::default().debounce_duration,
        }
    }

    /// Options from the environment: base directory per
    /// [`resolve_base_dir`], explicit user file from `LAYERED_CONFIG_USER_FILE`.
    pub fn discover() -> Self {
        let mut options = Self::new(resolve_base_dir(None));
        if let Ok(user_file) = std::env::var(USER_FILE_ENV)
            && !user_file.trim().is_empty()
        {
            options.user_file = Some(PathBuf::from(user_file.trim()));
        }
        options
    }

    pub fn with_user_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.user_file = Some(path.into());
        self
    }

    pub fn with_user_base_name(mut self, name: impl Into<String>) -> Self {
        self.user_base_name = name.into();
        self
    }

    pub fn with_user_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.user_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_defaults_dir(mut self, name: Option<&str>) -> Self {
        self.defaults_dir_name = name.map(str::to_string);
        self
    }

    pub fn with_watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Resolve a caller-supplied path against the base directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        resolve_against(&self.base_dir, path)
    }

    fn defaults_dir(&self) -> Option<PathBuf> {
        self.defaults_dir_name
            .as_deref()
            .map(|name| self.resolve(Path::new(name)))
    }

    /// The user source: the explicit file if configured, else the single
    /// convention match in the base directory.
    fn user_source(&self) -> Result<Option<PathBuf>> {
        if let Some(ref explicit) = self.user_file {
            return Ok(Some(self.resolve(explicit)));
        }
        locate_user_source(&self.base_dir, &self.user_base_name, &self.user_extensions)
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::discover()
    }
}

/// Base for the overlay operations.
#[derive(Debug, Clone, Copy)]
pub enum OverlayTarget<'a> {
    /// Start from nothing.
    Detached,
    /// Start from a caller-owned tree; the tree itself is not modified.
    Tree(&'a ConfigNode),
    /// Start from the live Default and store the result back into it.
    Default,
    /// Start from the live User and store the result back into it. Like
    /// [`ConfigStore::set_user_config`], this detaches the file watch.
    User,
}

struct LayerState {
    module_defaults: Arc<ConfigNode>,
    directory_defaults: Arc<ConfigNode>,
    default: Arc<ConfigNode>,
    user: Arc<ConfigNode>,
    user_path: Option<PathBuf>,
    /// Identifies the current user file attachment; events from older
    /// watches carry a different id and are ignored.
    attachment: Option<u64>,
    /// User file state at the last load; watch events that leave it
    /// unchanged (including the store's own reads) are ignored.
    user_fingerprint: Option<SourceFingerprint>,
    generation: u64,
}

struct StoreInner {
    options: StoreOptions,
    modules: Option<Arc<dyn ModuleSource>>,
    write_lock: Mutex<()>,
    state: RwLock<LayerState>,
    global: ArcSwapOption<ConfigNode>,
    watch: Mutex<Option<SourceWatch>>,
    next_attachment: AtomicU64,
    subscriptions: SubscriptionManager,
}

/// Shared handle to a configuration store. Cloning is cheap.
#[derive(Clone)]
pub struct ConfigStore {
    inner: Arc<StoreInner>,
}

impl ConfigStore {
    /// A store over explicit layers, with no sources on disk.
    pub fn new(default: ConfigNode, user: ConfigNode) -> Self {
        let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let options = StoreOptions::new(base_dir)
            .with_defaults_dir(None)
            .with_watch(false);
        let default = Arc::new(default);
        Self::from_parts(
            options,
            None,
            Arc::clone(&default),
            Arc::new(ConfigNode::Absent),
            default,
            Arc::new(user),
        )
    }

    /// Assemble the store at startup.
    ///
    /// Never fails: broken module defaults are skipped, a missing user file
    /// leaves User absent, and a broken or ambiguous user file is logged.
    pub fn open(options: StoreOptions, modules: Option<Arc<dyn ModuleSource>>) -> Self {
        let module_defaults = Arc::new(load_module_defaults(modules.as_deref()));
        let directory_defaults = Arc::new(load_directory_defaults(&options));
        let default = Arc::new(merge(&directory_defaults, &module_defaults));
        let user_source = options.user_source();

        let store = Self::from_parts(
            options,
            modules,
            module_defaults,
            directory_defaults,
            default,
            Arc::new(ConfigNode::Absent),
        );

        match user_source {
            Ok(Some(path)) => {
                if let Err(e) = store.attach_user_file(&path) {
                    warn!("User configuration not applied: {}", e);
                }
            }
            Ok(None) => debug!(
                "No user configuration in {}",
                store.inner.options.base_dir.display()
            ),
            Err(e) => warn!("{}; continuing with defaults only", e),
        }

        info!(generation = store.generation(), "Configuration store ready");
        store
    }

    fn from_parts(
        options: StoreOptions,
        modules: Option<Arc<dyn ModuleSource>>,
        module_defaults: Arc<ConfigNode>,
        directory_defaults: Arc<ConfigNode>,
        default: Arc<ConfigNode>,
        user: Arc<ConfigNode>,
    ) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                options,
                modules,
                write_lock: Mutex::new(()),
                state: RwLock::new(LayerState {
                    module_defaults,
                    directory_defaults,
                    default,
                    user,
                    user_path: None,
                    attachment: None,
                    user_fingerprint: None,
                    generation: 0,
                }),
                global: ArcSwapOption::empty(),
                watch: Mutex::new(None),
                next_attachment: AtomicU64::new(1),
                subscriptions: SubscriptionManager::new(),
            }),
        }
    }

    /// Install a store as the process-wide instance. Fails (returning the
    /// store) if one is already installed.
    pub fn install(store: ConfigStore) -> std::result::Result<(), ConfigStore> {
        PROCESS_STORE.set(store)
    }

    /// The process-wide instance, if installed.
    pub fn process() -> Option<&'static ConfigStore> {
        PROCESS_STORE.get()
    }

    pub fn options(&self) -> &StoreOptions {
        &self.inner.options
    }

    // ---- reads -------------------------------------------------------------

    pub fn default_config(&self) -> Arc<ConfigNode> {
        Arc::clone(&self.read_state().default)
    }

    pub fn user_config(&self) -> Arc<ConfigNode> {
        Arc::clone(&self.read_state().user)
    }

    /// The effective configuration, `merge(User, Default)`.
    pub fn global(&self) -> Arc<ConfigNode> {
        if let Some(cached) = self.inner.global.load_full() {
            return cached;
        }

        let (user, default, generation) = {
            let state = self.read_state();
            (Arc::clone(&state.user), Arc::clone(&state.default), state.generation)
        };
        let merged = Arc::new(merge(&user, &default));

        // Publish under the read lock so no writer can invalidate between the
        // generation check and the store.
        let state = self.read_state();
        if state.generation == generation {
            self.inner.global.store(Some(Arc::clone(&merged)));
            debug!(generation, "Rebuilt global configuration");
        } else {
            debug!(generation, "Discarded stale global configuration");
        }
        merged
    }

    /// An isolated copy of Global, unaffected by later writes or reloads.
    /// Returns an empty mapping when nothing is configured.
    pub fn get_current_scope(&self) -> ConfigNode {
        let global = self.global();
        if global.is_absent() {
            ConfigNode::empty_mapping()
        } else {
            global.as_ref().clone()
        }
    }

    /// Counter bumped by every write.
    pub fn generation(&self) -> u64 {
        self.read_state().generation
    }

    /// The attached user file, if any.
    pub fn user_source_path(&self) -> Option<PathBuf> {
        self.read_state().user_path.clone()
    }

    /// Whether a file watch is currently attached to the user source.
    pub fn is_watching(&self) -> bool {
        self.lock_watch().is_some()
    }

    // ---- notifications -----------------------------------------------------

    /// Call `callback` after every reload of the user source.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(ConfigChanged) + Send + Sync + 'static,
    {
        self.inner.subscriptions.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.subscriptions.unsubscribe(id)
    }

    /// Async, level-triggered view of user reloads: the value is the store
    /// generation after the latest reload.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.inner.subscriptions.receiver()
    }

    // ---- writes ------------------------------------------------------------

    /// Replace Default.
    pub fn set_default_config(&self, tree: ConfigNode) {
        let _guard = self.write_guard();
        let generation = self.commit(|state| state.default = Arc::new(tree));
        debug!(generation, "Default configuration replaced");
    }

    /// Replace User. Detaches the file watch; no further automatic reloads
    /// happen until a file is attached again.
    pub fn set_user_config(&self, tree: ConfigNode) {
        let detached = {
            let _guard = self.write_guard();
            let detached = self.lock_watch().take();
            let generation = self.commit(|state| {
                state.user = Arc::new(tree);
                state.user_path = None;
                state.attachment = None;
                state.user_fingerprint = None;
            });
            debug!(generation, "User configuration replaced");
            detached
        };
        drop(detached);
    }

    /// Rebuild Default from scratch.
    ///
    /// `rescan_modules` re-reads every module's defaults; `rescan_base_directory`
    /// re-reads the base directory's defaults folder. Either part not rescanned
    /// keeps its last loaded value. Any tree set through
    /// [`set_default_config`](Self::set_default_config) is discarded.
    pub fn reload_default(&self, rescan_modules: bool, rescan_base_directory: bool) {
        let module_defaults =
            rescan_modules.then(|| load_module_defaults(self.inner.modules.as_deref()));
        let directory_defaults =
            rescan_base_directory.then(|| load_directory_defaults(&self.inner.options));

        let _guard = self.write_guard();
        let generation = self.commit(|state| {
            if let Some(tree) = module_defaults {
                state.module_defaults = Arc::new(tree);
            }
            if let Some(tree) = directory_defaults {
                state.directory_defaults = Arc::new(tree);
            }
            state.default = Arc::new(merge(&state.directory_defaults, &state.module_defaults));
        });
        info!(generation, rescan_modules, rescan_base_directory, "Default configuration rebuilt");
    }

    /// Make `path` the user source: parse it, replace User, and watch it.
    ///
    /// A missing file leaves User absent until it is created. A malformed file
    /// is reported and User keeps its previous value; the file stays attached
    /// so a corrected version is picked up by the watch.
    pub fn attach_user_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = self.inner.options.resolve(path.as_ref());
        let attachment = self.inner.next_attachment.fetch_add(1, Ordering::Relaxed);

        let (previous, result) = {
            let _guard = self.write_guard();
            // Watch before reading so a write racing the read is not lost.
            let watch = self.start_watch(&path, attachment);
            let previous = std::mem::replace(&mut *self.lock_watch(), watch);

            let loaded = fingerprint(&path);
            let (user, result) = match read_source(&path) {
                Ok(tree) => (Some(tree), Ok(())),
                Err(ConfigError::SourceNotFound(_)) => (Some(ConfigNode::Absent), Ok(())),
                Err(e) => (None, Err(e)),
            };
            let generation = self.commit(|state| {
                if let Some(user) = user {
                    state.user = Arc::new(user);
                }
                state.user_path = Some(path.clone());
                state.attachment = Some(attachment);
                state.user_fingerprint = loaded;
            });
            info!(generation, "User configuration attached: {}", path.display());
            (previous, result)
        };
        drop(previous);
        result
    }

    /// Re-read the attached user file through the same path the file watch
    /// uses, and notify even if nothing changed. Returns `Ok(false)` if no
    /// file is attached.
    pub fn reload_user(&self) -> Result<bool> {
        self.reload_attached(None)
    }

    /// Reload the user file. `attachment` is set for watch events: those are
    /// dropped when they come from a detached watch, when the file's
    /// fingerprint is unchanged since the last load, or when its content
    /// parses to the current User.
    fn reload_attached(&self, attachment: Option<u64>) -> Result<bool> {
        let _guard = self.write_guard();
        let (path, current, last_loaded) = {
            let state = self.read_state();
            (state.user_path.clone(), state.attachment, state.user_fingerprint)
        };
        let Some(path) = path else {
            return Ok(false);
        };
        let from_watch = attachment.is_some();
        if from_watch && attachment != current {
            debug!("Ignoring event from a detached watch: {}", path.display());
            return Ok(false);
        }

        let loaded = fingerprint(&path);
        if from_watch && loaded == last_loaded {
            debug!("User configuration unchanged: {}", path.display());
            return Ok(false);
        }

        let parsed = match read_source(&path) {
            Ok(tree) => Ok(tree),
            Err(ConfigError::SourceNotFound(_)) => Ok(ConfigNode::Absent),
            Err(e) => Err(e),
        };
        // Recorded even for a broken file, so re-reading it is not retried
        // until it is written again.
        self.write_state().user_fingerprint = loaded;
        let user = match parsed {
            Ok(tree) => tree,
            Err(e) => {
                warn!("Keeping last good user configuration: {}", e);
                return Err(e);
            }
        };

        if from_watch && *self.read_state().user == user {
            debug!("User configuration content unchanged: {}", path.display());
            return Ok(false);
        }

        let generation = self.commit(|state| state.user = Arc::new(user));
        info!(generation, "User configuration reloaded: {}", path.display());
        self.inner.subscriptions.notify(generation);
        Ok(true)
    }

    // ---- overlays ----------------------------------------------------------

    /// Fold JSON text over `target`.
    pub fn apply_json(&self, text: &str, target: OverlayTarget<'_>) -> Result<ConfigNode> {
        let overlay = parse_source(text, "inline")?;
        Ok(self.fold_into(target, vec![overlay]))
    }

    /// Fold a JSON file over `target`. Relative paths resolve against the
    /// base directory.
    pub fn apply_json_from_path(
        &self,
        path: impl AsRef<Path>,
        target: OverlayTarget<'_>,
    ) -> Result<ConfigNode> {
        let path = self.inner.options.resolve(path.as_ref());
        let overlay = read_source(&path)?;
        debug!("Applying overlay file {}", path.display());
        Ok(self.fold_into(target, vec![overlay]))
    }

    /// Fold every configuration file in a directory over `target`, in the
    /// sorted order of [`scan_directory`]: later files win.
    ///
    /// Every file is parsed before anything is merged, so a malformed file
    /// fails the whole call and leaves the store untouched.
    pub fn apply_from_directory(
        &self,
        path: impl AsRef<Path>,
        target: OverlayTarget<'_>,
        recursive: bool,
    ) -> Result<ConfigNode> {
        let dir = self.inner.options.resolve(path.as_ref());
        let files = scan_directory(&dir, recursive)?;
        let overlays = files
            .iter()
            .map(|file| {
                debug!("Applying overlay file {}", file.display());
                read_source(file)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(self.fold_into(target, overlays))
    }

    fn fold_into(&self, target: OverlayTarget<'_>, overlays: Vec<ConfigNode>) -> ConfigNode {
        let fold = |base: ConfigNode| {
            overlays
                .into_iter()
                .fold(base, |acc, overlay| merge_owned(overlay, acc))
        };

        match target {
            OverlayTarget::Detached => fold(ConfigNode::Absent),
            OverlayTarget::Tree(base) => fold(base.clone()),
            OverlayTarget::Default => {
                let _guard = self.write_guard();
                let merged = fold(self.read_state().default.as_ref().clone());
                let shared = Arc::new(merged.clone());
                self.commit(|state| state.default = shared);
                merged
            }
            OverlayTarget::User => {
                let (merged, detached) = {
                    let _guard = self.write_guard();
                    let merged = fold(self.read_state().user.as_ref().clone());
                    let shared = Arc::new(merged.clone());
                    let detached = self.lock_watch().take();
                    self.commit(|state| {
                        state.user = shared;
                        state.user_path = None;
                        state.attachment = None;
                        state.user_fingerprint = None;
                    });
                    (merged, detached)
                };
                drop(detached);
                merged
            }
        }
    }

    // ---- internals ---------------------------------------------------------

    /// Apply a change to the layers and invalidate Global. Callers must hold
    /// the write lock.
    fn commit(&self, change: impl FnOnce(&mut LayerState)) -> u64 {
        let mut state = self.write_state();
        change(&mut state);
        state.generation += 1;
        self.inner.global.store(None);
        state.generation
    }

    fn start_watch(&self, path: &Path, attachment: u64) -> Option<SourceWatch> {
        if !self.inner.options.watch {
            return None;
        }
        let store = Arc::downgrade(&self.inner);
        let config = WatcherConfig {
            debounce_duration: self.inner.options.debounce,
        };
        let result = watch_file(path, &config, move |event| {
            let Some(inner) = store.upgrade() else {
                return;
            };
            let store = ConfigStore { inner };
            match event {
                WatchEvent::Changed(_) => {
                    // Failures are logged inside; the last good User stays.
                    let _ = store.reload_attached(Some(attachment));
                }
                WatchEvent::Error(message) => {
                    warn!("Configuration hot reload may be interrupted: {}", message);
                }
            }
        });
        match result {
            Ok(watch) => Some(watch),
            Err(e) => {
                warn!(
                    "Hot reload disabled for {}: {}",
                    path.display(),
                    ConfigError::from(e)
                );
                None
            }
        }
    }

    fn write_guard(&self) -> MutexGuard<'_, ()> {
        self.inner.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_state(&self) -> RwLockReadGuard<'_, LayerState> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, LayerState> {
        self.inner.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_watch(&self) -> MutexGuard<'_, Option<SourceWatch>> {
        self.inner.watch.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read_state();
        f.debug_struct("ConfigStore")
            .field("base_dir", &self.inner.options.base_dir)
            .field("user_path", &state.user_path)
            .field("generation", &state.generation)
            .finish()
    }
}

/// Fold every module's defaults, skipping modules whose default is broken.
fn load_module_defaults(modules: Option<&dyn ModuleSource>) -> ConfigNode {
    let Some(modules) = modules else {
        return ConfigNode::Absent;
    };
    list_candidate_sources(modules)
        .into_iter()
        .fold(ConfigNode::Absent, |acc, candidate| {
            match parse_source(&candidate.text, &candidate.origin()) {
                Ok(tree) => {
                    debug!(module = %candidate.module_id, "Folded module defaults");
                    merge_owned(tree, acc)
                }
                Err(e) => {
                    warn!(module = %candidate.module_id, "Skipping module defaults: {}", e);
                    acc
                }
            }
        })
}

/// Fold the base directory's defaults folder, skipping broken files.
fn load_directory_defaults(options: &StoreOptions) -> ConfigNode {
    let Some(dir) = options.defaults_dir() else {
        return ConfigNode::Absent;
    };
    if !dir.is_dir() {
        return ConfigNode::Absent;
    }
    let files = match scan_directory(&dir, false) {
        Ok(files) => files,
        Err(e) => {
            warn!("Skipping defaults directory: {}", e);
            return ConfigNode::Absent;
        }
    };
    files.iter().fold(ConfigNode::Absent, |acc, file| match read_source(file) {
        Ok(tree) => merge_owned(tree, acc),
        Err(e) => {
            warn!("Skipping defaults file: {}", e);
            acc
        }
    })
}
