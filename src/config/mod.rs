//! Layered configuration.
//!
//! Three layers, lowest to highest precedence:
//! 1. **Default** - each module's embedded `defaults.json`, folded in load
//!    order with the entry module last, then `<base>/config.d/*.json`
//! 2. **User** - `<base>/settings.json` (or `.jsonc`), hot reloaded
//! 3. **Global** - `merge(User, Default)`, memoized until the next write
//!
//! ## Merge Strategy
//! - Mappings: merged key by key, overlay wins
//! - Sequences: concatenated, base items first
//! - Everything else: overlay wins; an absent overlay keeps the base
//!
//! ## Environment Variables
//! - `LAYERED_CONFIG_BASE_DIR` - Base execution directory
//! - `LAYERED_CONFIG_USER_FILE` - Explicit user file (overrides discovery)

pub mod loader;
pub mod merge;
pub mod path;
pub mod source;
pub mod store;
pub mod watcher;

pub use loader::{
    CandidateSource, EmbeddedResource, ModuleInfo, ModuleSource, StaticModules,
    list_candidate_sources, locate_user_source, scan_directory,
};
pub use merge::{merge, merge_all, merge_owned};
pub use path::{ConfigPath, PathSegment};
pub use source::{parse_source, read_source, strip_comments};
pub use store::{ConfigStore, OverlayTarget, StoreOptions};
pub use watcher::{SourceWatch, WatchEvent, WatcherConfig, watch_file};
