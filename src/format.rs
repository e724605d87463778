//! Output formatting for configuration trees.

use crate::config::path::ConfigPath;
use crate::node::ConfigNode;

/// Output format for rendered trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Pretty-printed JSON.
    #[default]
    Json,
    /// One `path = value` line per leaf.
    Flat,
}

impl OutputFormat {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "flat" | "lines" => Some(OutputFormat::Flat),
            _ => None,
        }
    }
}

/// Render a tree in the given format.
pub fn render(node: &ConfigNode, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(&node.to_json()).unwrap_or_else(|_| node.to_string())
        }
        OutputFormat::Flat => flatten(node)
            .into_iter()
            .map(|(path, value)| format!("{} = {}", path, value))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// Leaves of a tree with their paths, in document order.
///
/// Scalars and empty containers are leaves and render as JSON. An absent tree
/// has no leaves; a scalar root renders under the empty path.
pub fn flatten(node: &ConfigNode) -> Vec<(String, String)> {
    let mut out = Vec::new();
    flatten_into(node, ConfigPath::root(), &mut out);
    out
}

fn flatten_into(node: &ConfigNode, path: ConfigPath, out: &mut Vec<(String, String)>) {
    match node {
        ConfigNode::Absent => {}
        ConfigNode::Mapping(map) if !map.is_empty() => {
            for (key, child) in map {
                flatten_into(child, path.join_key(key), out);
            }
        }
        ConfigNode::Sequence(items) if !items.is_empty() => {
            for (i, child) in items.iter().enumerate() {
                flatten_into(child, path.join_index(i), out);
            }
        }
        leaf => out.push((path.to_string(), leaf.to_string())),
    }
}
