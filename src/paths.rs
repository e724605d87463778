//! Base directory resolution and lexical path normalization.
//!
//! Pure path manipulation apart from [`resolve_base_dir`], which consults the
//! environment and the location of the running executable.

use std::path::{Component, Path, PathBuf};

/// Environment variable overriding the base execution directory.
pub const BASE_DIR_ENV: &str = "LAYERED_CONFIG_BASE_DIR";

/// Environment variable naming an explicit user configuration file.
pub const USER_FILE_ENV: &str = "LAYERED_CONFIG_USER_FILE";

/// Resolve the base execution directory.
///
/// Order: `explicit`, then [`BASE_DIR_ENV`], then the directory containing the
/// current executable, then the current working directory.
pub fn resolve_base_dir(explicit: Option<&Path>) -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    if let Some(dir) = explicit {
        return resolve_against(&cwd, dir);
    }

    if let Ok(dir) = std::env::var(BASE_DIR_ENV)
        && !dir.trim().is_empty()
    {
        return resolve_against(&cwd, Path::new(dir.trim()));
    }

    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or(cwd)
}

/// Resolve `path` against `base` and normalize the result.
///
/// Absolute paths are kept (but normalized); relative paths are joined onto
/// `base`.
pub fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize_path_components(path)
    } else {
        normalize_path_components(&base.join(path))
    }
}

/// Normalize path components without requiring the file to exist.
/// Handles `.` and `..` components.
pub fn normalize_path_components(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::Prefix(p) => components.push(Component::Prefix(p)),
            Component::RootDir => components.push(Component::RootDir),
            Component::CurDir => {}
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                } else if !matches!(components.last(), Some(Component::RootDir)) {
                    // Leading `..` on a relative path is kept; `/..` is `/`.
                    components.push(Component::ParentDir);
                }
            }
            Component::Normal(name) => components.push(Component::Normal(name)),
        }
    }

    if components.is_empty() {
        return PathBuf::from(".");
    }
    components.iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_components() {
        assert_eq!(
            normalize_path_components(Path::new("/app/./config/../settings.json")),
            PathBuf::from("/app/settings.json")
        );
        assert_eq!(
            normalize_path_components(Path::new("../shared/./a.json")),
            PathBuf::from("../shared/a.json")
        );
        assert_eq!(normalize_path_components(Path::new("/../x")), PathBuf::from("/x"));
        assert_eq!(normalize_path_components(Path::new("a/..")), PathBuf::from("."));
    }

    #[test]
    fn test_resolve_against() {
        let base = Path::new("/opt/app");
        assert_eq!(
            resolve_against(base, Path::new("conf/../settings.json")),
            PathBuf::from("/opt/app/settings.json")
        );
        assert_eq!(
            resolve_against(base, Path::new("/etc/app/settings.json")),
            PathBuf::from("/etc/app/settings.json")
        );
    }

    #[test]
    fn test_explicit_base_dir_wins() {
        let dir = tempfile::TempDir::new().unwrap();
        assert_eq!(resolve_base_dir(Some(dir.path())), dir.path());
    }
}
