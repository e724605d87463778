//! Source discovery collaborators.
//!
//! The store never enumerates modules or walks the filesystem on its own; it
//! asks the helpers here for raw text and paths:
//! - [`ModuleSource`]: loaded modules and their embedded resources
//! - [`locate_user_source`]: the single user settings file in a directory
//! - [`scan_directory`]: overlay files under a directory, in a fixed order

use crate::error::{ConfigError, Result};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, warn};

/// Resource name that marks a module's default configuration. Matched
/// case-insensitively, either exactly or as a `.defaults.json` suffix.
pub const DEFAULT_RESOURCE_NAME: &str = "defaults.json";

/// File extensions accepted for configuration files on disk.
pub const SOURCE_EXTENSIONS: &[&str] = &["json", "jsonc"];

/// A named text resource compiled into a module.
#[derive(Debug, Clone)]
pub struct EmbeddedResource {
    pub name: String,
    pub text: Cow<'static, str>,
}

impl EmbeddedResource {
    pub fn new(name: impl Into<String>, text: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

/// A loaded module and the resources it carries.
#[derive(Debug, Clone)]
pub struct ModuleInfo {
    pub id: String,
    /// The entry module's defaults take precedence over every library's.
    pub is_entry: bool,
    pub resources: Vec<EmbeddedResource>,
}

impl ModuleInfo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_entry: false,
            resources: Vec::new(),
        }
    }

    /// Mark this module as the entry module.
    pub fn entry(mut self) -> Self {
        self.is_entry = true;
        self
    }

    pub fn with_resource(
        mut self,
        name: impl Into<String>,
        text: impl Into<Cow<'static, str>>,
    ) -> Self {
        self.resources.push(EmbeddedResource::new(name, text));
        self
    }

    /// Shorthand for a module whose only resource is its defaults.
    pub fn with_defaults(self, text: impl Into<Cow<'static, str>>) -> Self {
        self.with_resource(DEFAULT_RESOURCE_NAME, text)
    }

    /// The resource holding this module's default configuration, if any.
    ///
    /// When several resources match, the lexicographically first name wins.
    pub fn default_resource(&self) -> Option<&EmbeddedResource> {
        let mut matches: Vec<&EmbeddedResource> = self
            .resources
            .iter()
            .filter(|r| is_default_resource(&r.name))
            .collect();
        matches.sort_by(|a, b| a.name.cmp(&b.name));
        if matches.len() > 1 {
            warn!(
                module = %self.id,
                using = %matches[0].name,
                "Module carries {} default configuration resources",
                matches.len()
            );
        }
        matches.into_iter().next()
    }
}

/// Whether a resource name follows the default configuration convention.
pub fn is_default_resource(name: &str) -> bool {
    let file_name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let lower = file_name.to_ascii_lowercase();
    lower == DEFAULT_RESOURCE_NAME || lower.ends_with(&format!(".{}", DEFAULT_RESOURCE_NAME))
}

/// Enumerates the currently loaded modules.
pub trait ModuleSource: Send + Sync {
    /// Modules in load order.
    fn modules(&self) -> Vec<ModuleInfo>;
}

/// In-process module registry, populated by crates with `include_str!`
/// resources. Load order is registration order.
#[derive(Debug, Default)]
pub struct StaticModules {
    modules: RwLock<Vec<ModuleInfo>>,
}

impl StaticModules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, module: ModuleInfo) {
        let mut modules = self.modules.write().unwrap_or_else(PoisonError::into_inner);
        debug!(module = %module.id, entry = module.is_entry, "Registered module");
        modules.push(module);
    }

    pub fn len(&self) -> usize {
        self.modules.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<ModuleInfo> for StaticModules {
    fn from_iter<T: IntoIterator<Item = ModuleInfo>>(iter: T) -> Self {
        Self {
            modules: RwLock::new(iter.into_iter().collect()),
        }
    }
}

impl ModuleSource for StaticModules {
    fn modules(&self) -> Vec<ModuleInfo> {
        self.modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Raw default configuration contributed by one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSource {
    pub module_id: String,
    pub resource: String,
    pub text: String,
}

impl CandidateSource {
    /// Name used for this source in diagnostics.
    pub fn origin(&self) -> String {
        format!("{}:{}", self.module_id, self.resource)
    }
}

/// Module defaults in fold order: non-entry modules in load order, then the
/// entry module. Modules without a default resource are omitted.
pub fn list_candidate_sources(source: &dyn ModuleSource) -> Vec<CandidateSource> {
    let (entry, libraries): (Vec<ModuleInfo>, Vec<ModuleInfo>) =
        source.modules().into_iter().partition(|m| m.is_entry);

    libraries
        .iter()
        .chain(entry.iter())
        .filter_map(|module| {
            module.default_resource().map(|resource| CandidateSource {
                module_id: module.id.clone(),
                resource: resource.name.clone(),
                text: resource.text.to_string(),
            })
        })
        .collect()
}

/// Check a path's extension against [`SOURCE_EXTENSIONS`], case-insensitively.
pub fn has_source_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            SOURCE_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
}

/// Find the user settings file `<base_name>.<ext>` in `dir`.
///
/// Names are matched case-insensitively. More than one match is an
/// [`ConfigError::AmbiguousUserSource`]; no match is `Ok(None)`.
pub fn locate_user_source(
    dir: &Path,
    base_name: &str,
    extensions: &[String],
) -> Result<Option<PathBuf>> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let entries = std::fs::read_dir(dir).map_err(|e| ConfigError::io(dir, e))?;

    let mut found: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::io(dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let matches = extensions.iter().any(|ext| {
            let candidate = format!("{}.{}", base_name, ext);
            file_name.eq_ignore_ascii_case(&candidate)
        });
        if matches {
            found.push(path);
        }
    }
    found.sort();

    match found.len() {
        0 => Ok(None),
        1 => Ok(found.pop()),
        _ => Err(ConfigError::AmbiguousUserSource(found)),
    }
}

/// List configuration files under `dir`, sorted by path.
///
/// Sorting is component-wise and byte-lexicographic, so the order is the same
/// on every platform. With `recursive`, files in subdirectories are included
/// and sort by their full relative path (`a.json` < `b/x.json` < `c.json`).
/// Symlinked directories are not descended into.
pub fn scan_directory(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ConfigError::DirectoryNotFound(dir.to_path_buf()));
    }
    let mut files = Vec::new();
    collect_files(dir, recursive, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_files(dir: &Path, recursive: bool, files: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| ConfigError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::io(dir, e))?;
        let path = entry.path();
        // Symlinks are not followed into directories, so link cycles end here.
        let file_type = entry.file_type().map_err(|e| ConfigError::io(&path, e))?;
        if file_type.is_dir() {
            if recursive {
                collect_files(&path, recursive, files)?;
            }
        } else if !path.is_dir() && has_source_extension(&path) {
            files.push(path);
        }
    }
    Ok(())
}
