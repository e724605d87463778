//! Source text preprocessing and parsing.
//!
//! Every configuration source (module defaults, overlay files, the user file)
//! goes through [`parse_source`]: lines whose first non-whitespace character
//! is `#` are blanked, then the remainder is parsed as JSON.

use crate::error::{ConfigError, Result};
use crate::node::ConfigNode;
use std::io::ErrorKind;
use std::path::Path;
use std::time::SystemTime;

/// Blank out `#` comment lines.
///
/// Comment lines are replaced by empty lines rather than removed so parse
/// errors still report line numbers of the original text.
pub fn strip_comments(text: &str) -> String {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        if line.trim_start().starts_with('#') {
            if line.ends_with("\r\n") {
                out.push_str("\r\n");
            } else if line.ends_with('\n') {
                out.push('\n');
            }
        } else {
            out.push_str(line);
        }
    }
    out
}

/// Parse comment-annotated JSON into a tree.
///
/// A source that is empty after comment stripping yields an empty mapping.
/// `origin` names the source in error messages.
pub fn parse_source(text: &str, origin: &str) -> Result<ConfigNode> {
    let stripped = strip_comments(text);
    if stripped.trim().is_empty() {
        return Ok(ConfigNode::empty_mapping());
    }
    let value: serde_json::Value =
        serde_json::from_str(&stripped).map_err(|e| ConfigError::malformed(origin, e))?;
    Ok(ConfigNode::from(value))
}

/// Read and parse a source file.
pub fn read_source(path: &Path) -> Result<ConfigNode> {
    let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ConfigError::SourceNotFound(path.to_path_buf()),
        _ => ConfigError::io(path, e),
    })?;
    parse_source(&text, &path.display().to_string())
}

/// Modification time and length of a source file, taken without reading it.
///
/// Two equal fingerprints mean the file was not written in between, up to
/// the filesystem's timestamp resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceFingerprint {
    modified: Option<SystemTime>,
    len: u64,
}

/// Fingerprint a file, or `None` if it does not exist or cannot be stat'ed.
pub fn fingerprint(path: &Path) -> Option<SourceFingerprint> {
    let metadata = std::fs::metadata(path).ok()?;
    Some(SourceFingerprint {
        modified: metadata.modified().ok(),
        len: metadata.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use serde_json::json;

    #[test]
    fn test_strip_comment_lines() {
        let text = "# header\n{\n  # \"broken\": [\n  \"a\": 1\n}\n";
        let stripped = strip_comments(text);
        assert_eq!(stripped, "\n{\n\n  \"a\": 1\n}\n");
    }

    #[test]
    fn test_hash_inside_values_is_kept() {
        let node = parse_source(r##"{"color": "#ff0000"}"##, "inline").unwrap();
        assert_eq!(node["color"].as_str(), "#ff0000");
    }

    #[test]
    fn test_comment_with_invalid_json_is_ignored() {
        let text = r#"{
    # this is not json: {{{ ]]
    "name": "app",
        #"name": "shadowed"
    "port": 80
}"#;
        let node = parse_source(text, "inline").unwrap();
        assert_eq!(node, ConfigNode::from(json!({"name": "app", "port": 80})));
    }

    #[test]
    fn test_crlf_and_bom() {
        let text = "\u{feff}{\r\n# comment\r\n\"a\": true\r\n}";
        let node = parse_source(text, "inline").unwrap();
        assert!(node["a"].as_bool());
    }

    #[test]
    fn test_empty_source_is_empty_mapping() {
        let node = parse_source("# only comments\n\n", "inline").unwrap();
        assert_eq!(node, ConfigNode::empty_mapping());
    }

    #[test]
    fn test_malformed_source() {
        let err = parse_source("{\"a\": }", "broken.json").unwrap_err();
        assert_eq!(err.code(), ErrorCode::MalformedSource);
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = read_source(&dir.path().join("nope.json")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::SourceNotFound);
    }

    #[test]
    fn test_fingerprint_tracks_writes() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        assert_eq!(fingerprint(&path), None);

        std::fs::write(&path, "{}").unwrap();
        let first = fingerprint(&path).unwrap();
        assert_eq!(fingerprint(&path), Some(first));

        // Reading does not change it.
        read_source(&path).unwrap();
        assert_eq!(fingerprint(&path), Some(first));

        std::fs::write(&path, r#"{"a": 1}"#).unwrap();
        assert_ne!(fingerprint(&path), Some(first));
    }
}
