//! Configuration tree data model.
//!
//! A [`ConfigNode`] is an immutable tree of scalars, sequences and mappings.
//! The [`ConfigNode::Absent`] variant is the null-preventer: every lookup that
//! falls off the edge of a real tree lands on it, and it answers further
//! lookups with itself and every conversion with a type-appropriate default.
//! Consumers can therefore chain `cfg["a"]["b"]["c"].as_i64()` without
//! checking that any intermediate node exists.

use crate::config::path::{ConfigPath, PathSegment};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::{Number, Value};
use std::fmt;
use std::ops;

/// Shared terminal returned by lookups that miss.
static ABSENT: ConfigNode = ConfigNode::Absent;

/// Mapping storage: insertion-ordered, equality ignores order.
pub type Mapping = IndexMap<String, ConfigNode>;

/// A leaf value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => Ok(()),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::String(s) => f.write_str(s),
        }
    }
}

/// One layer of configuration, or the merged view of several.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ConfigNode {
    /// Null-preventer: the value of every path that does not exist.
    #[default]
    Absent,
    Scalar(Scalar),
    Sequence(Vec<ConfigNode>),
    Mapping(Mapping),
}

mod private {
    pub trait Sealed {}
    impl Sealed for usize {}
    impl Sealed for str {}
    impl Sealed for String {}
    impl<T: ?Sized + Sealed> Sealed for &T {}
}

/// Types that can index into a [`ConfigNode`]: `usize` for sequences and
/// string keys for mappings.
pub trait NodeIndex: private::Sealed {
    #[doc(hidden)]
    fn index_into<'a>(&self, node: &'a ConfigNode) -> Option<&'a ConfigNode>;
}

impl NodeIndex for usize {
    fn index_into<'a>(&self, node: &'a ConfigNode) -> Option<&'a ConfigNode> {
        match node {
            ConfigNode::Sequence(items) => items.get(*self),
            _ => None,
        }
    }
}

impl NodeIndex for str {
    fn index_into<'a>(&self, node: &'a ConfigNode) -> Option<&'a ConfigNode> {
        match node {
            ConfigNode::Mapping(fields) => fields.get(self),
            _ => None,
        }
    }
}

impl NodeIndex for String {
    fn index_into<'a>(&self, node: &'a ConfigNode) -> Option<&'a ConfigNode> {
        self.as_str().index_into(node)
    }
}

impl<T: ?Sized + NodeIndex> NodeIndex for &T {
    fn index_into<'a>(&self, node: &'a ConfigNode) -> Option<&'a ConfigNode> {
        (**self).index_into(node)
    }
}

impl ConfigNode {
    /// An empty mapping (`{}`).
    pub fn empty_mapping() -> Self {
        ConfigNode::Mapping(Mapping::new())
    }

    /// Look up a child by key or index. Never fails: a miss yields
    /// [`ConfigNode::Absent`].
    pub fn get<I: NodeIndex>(&self, index: I) -> &ConfigNode {
        index.index_into(self).unwrap_or(&ABSENT)
    }

    /// Navigate a dotted path such as `server.ports[0]`.
    pub fn at(&self, path: &str) -> &ConfigNode {
        self.at_path(&ConfigPath::parse(path))
    }

    /// Navigate a pre-parsed path.
    pub fn at_path(&self, path: &ConfigPath) -> &ConfigNode {
        path.segments()
            .iter()
            .fold(self, |node, segment| match segment {
                PathSegment::Key(key) => node.get(key),
                PathSegment::Index(i) => node.get(*i),
            })
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, ConfigNode::Absent)
    }

    /// True for every variant except [`ConfigNode::Absent`].
    pub fn exists(&self) -> bool {
        !self.is_absent()
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, ConfigNode::Scalar(_))
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, ConfigNode::Sequence(_))
    }

    pub fn is_mapping(&self) -> bool {
        matches!(self, ConfigNode::Mapping(_))
    }

    /// True for an explicit JSON `null`.
    pub fn is_null(&self) -> bool {
        matches!(self, ConfigNode::Scalar(Scalar::Null))
    }

    /// Borrow a string scalar, or `""` for anything else.
    pub fn as_str(&self) -> &str {
        match self {
            ConfigNode::Scalar(Scalar::String(s)) => s,
            _ => "",
        }
    }

    /// Render any scalar as text. Containers render as compact JSON; absent
    /// and `null` render as the empty string.
    pub fn as_string(&self) -> String {
        match self {
            ConfigNode::Absent => String::new(),
            ConfigNode::Scalar(scalar) => scalar.to_string(),
            ConfigNode::Sequence(_) | ConfigNode::Mapping(_) => self.to_json().to_string(),
        }
    }

    /// Integer view. Floats are truncated, numeric strings are parsed,
    /// booleans map to 0/1, everything else is 0.
    pub fn as_i64(&self) -> i64 {
        match self {
            ConfigNode::Scalar(Scalar::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
                .unwrap_or(0),
            ConfigNode::Scalar(Scalar::String(s)) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
                    .unwrap_or(0)
            }
            ConfigNode::Scalar(Scalar::Bool(b)) => i64::from(*b),
            _ => 0,
        }
    }

    /// Unsigned view of [`as_i64`](Self::as_i64); negative values become 0.
    pub fn as_u64(&self) -> u64 {
        match self {
            ConfigNode::Scalar(Scalar::Number(n)) if n.is_u64() => n.as_u64().unwrap_or(0),
            _ => u64::try_from(self.as_i64()).unwrap_or(0),
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            ConfigNode::Scalar(Scalar::Number(n)) => n.as_f64().unwrap_or(0.0),
            ConfigNode::Scalar(Scalar::String(s)) => s.trim().parse().unwrap_or(0.0),
            ConfigNode::Scalar(Scalar::Bool(b)) => f64::from(u8::from(*b)),
            _ => 0.0,
        }
    }

    /// Boolean view. Accepts `true`/`yes`/`on`/`1` strings (case-insensitive)
    /// and non-zero numbers.
    pub fn as_bool(&self) -> bool {
        match self {
            ConfigNode::Scalar(Scalar::Bool(b)) => *b,
            ConfigNode::Scalar(Scalar::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            ConfigNode::Scalar(Scalar::String(s)) => matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "true" | "yes" | "on" | "1"
            ),
            _ => false,
        }
    }

    /// Sequence items, or an empty slice for any other variant.
    pub fn as_list(&self) -> &[ConfigNode] {
        match self {
            ConfigNode::Sequence(items) => items,
            _ => &[],
        }
    }

    /// Borrow the underlying mapping, if this is one.
    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            ConfigNode::Mapping(fields) => Some(fields),
            _ => None,
        }
    }

    /// Iterate children: sequence items in order, or mapping values in
    /// insertion order. Scalars and absent nodes yield nothing.
    pub fn iter(&self) -> Box<dyn Iterator<Item = &ConfigNode> + '_> {
        match self {
            ConfigNode::Sequence(items) => Box::new(items.iter()),
            ConfigNode::Mapping(fields) => Box::new(fields.values()),
            _ => Box::new(std::iter::empty()),
        }
    }

    /// Key/value pairs of a mapping in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &ConfigNode)> {
        self.as_mapping()
            .into_iter()
            .flat_map(|fields| fields.iter().map(|(k, v)| (k.as_str(), v)))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries().map(|(k, _)| k)
    }

    /// Number of children; 0 for scalars and absent nodes.
    pub fn len(&self) -> usize {
        match self {
            ConfigNode::Sequence(items) => items.len(),
            ConfigNode::Mapping(fields) => fields.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert to a `serde_json::Value`. Absent becomes `null`.
    pub fn to_json(&self) -> Value {
        match self {
            ConfigNode::Absent | ConfigNode::Scalar(Scalar::Null) => Value::Null,
            ConfigNode::Scalar(Scalar::Bool(b)) => Value::Bool(*b),
            ConfigNode::Scalar(Scalar::Number(n)) => Value::Number(n.clone()),
            ConfigNode::Scalar(Scalar::String(s)) => Value::String(s.clone()),
            ConfigNode::Sequence(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            ConfigNode::Mapping(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Bind this subtree to a serde type.
    pub fn deserialize<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(self.to_json())
    }
}

impl From<Value> for ConfigNode {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => ConfigNode::Scalar(Scalar::Null),
            Value::Bool(b) => ConfigNode::Scalar(Scalar::Bool(b)),
            Value::Number(n) => ConfigNode::Scalar(Scalar::Number(n)),
            Value::String(s) => ConfigNode::Scalar(Scalar::String(s)),
            Value::Array(items) => {
                ConfigNode::Sequence(items.into_iter().map(ConfigNode::from).collect())
            }
            Value::Object(fields) => ConfigNode::Mapping(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, ConfigNode::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<Scalar> for ConfigNode {
    fn from(scalar: Scalar) -> Self {
        ConfigNode::Scalar(scalar)
    }
}

impl From<Mapping> for ConfigNode {
    fn from(fields: Mapping) -> Self {
        ConfigNode::Mapping(fields)
    }
}

impl From<Vec<ConfigNode>> for ConfigNode {
    fn from(items: Vec<ConfigNode>) -> Self {
        ConfigNode::Sequence(items)
    }
}

impl<I: NodeIndex> ops::Index<I> for ConfigNode {
    type Output = ConfigNode;

    fn index(&self, index: I) -> &ConfigNode {
        self.get(index)
    }
}

impl Serialize for ConfigNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ConfigNode::Absent | ConfigNode::Scalar(Scalar::Null) => serializer.serialize_unit(),
            ConfigNode::Scalar(Scalar::Bool(b)) => serializer.serialize_bool(*b),
            ConfigNode::Scalar(Scalar::Number(n)) => n.serialize(serializer),
            ConfigNode::Scalar(Scalar::String(s)) => serializer.serialize_str(s),
            ConfigNode::Sequence(items) => serializer.collect_seq(items),
            ConfigNode::Mapping(fields) => serializer.collect_map(fields),
        }
    }
}

impl fmt::Display for ConfigNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn sample() -> ConfigNode {
        ConfigNode::from(json!({
            "server": {"host": "localhost", "port": 8080, "tls": false},
            "features": ["a", "b"],
            "ratio": 0.75,
            "retries": "3",
            "enabled": "yes"
        }))
    }

    #[test]
    fn test_get_existing_paths() {
        let cfg = sample();
        assert_eq!(cfg["server"]["host"].as_str(), "localhost");
        assert_eq!(cfg["server"]["port"].as_i64(), 8080);
        assert_eq!(cfg["features"][1].as_str(), "b");
        assert!(cfg["features"].is_sequence());
        assert!(cfg["server"].is_mapping());
        assert!(cfg["ratio"].is_scalar());
    }

    #[test]
    fn test_missing_paths_are_absent() {
        let cfg = sample();
        assert!(cfg["missing"].is_absent());
        assert_eq!(cfg["missing"]["anything"]["deeper"].as_i64(), 0);
        assert_eq!(cfg["missing"]["anything"].as_string(), "");
        assert!(!cfg["missing"].as_bool());
        assert!(cfg["missing"].as_list().is_empty());
        assert_eq!(cfg["missing"].iter().count(), 0);
    }

    #[test]
    fn test_out_of_range_index_is_absent() {
        let cfg = sample();
        assert!(cfg["features"][5].is_absent());
        assert!(cfg["features"]["key"].is_absent());
    }

    #[test]
    fn test_scalars_have_no_children() {
        let cfg = sample();
        assert!(cfg["server"]["host"]["nested"].is_absent());
        assert!(cfg["server"]["port"][0].is_absent());
    }

    #[test]
    fn test_absent_navigates_to_itself() {
        let absent = ConfigNode::Absent;
        assert!(absent["a"][3]["b"].is_absent());
        assert_eq!(absent.len(), 0);
        assert_eq!(absent.as_f64(), 0.0);
    }

    #[test]
    fn test_lenient_conversions() {
        let cfg = sample();
        assert_eq!(cfg["retries"].as_i64(), 3);
        assert_eq!(cfg["retries"].as_u64(), 3);
        assert!(cfg["enabled"].as_bool());
        assert_eq!(cfg["ratio"].as_f64(), 0.75);
        assert_eq!(cfg["ratio"].as_i64(), 0);
        assert_eq!(cfg["server"]["port"].as_string(), "8080");
        assert!(!cfg["server"]["tls"].as_bool());
        assert_eq!(ConfigNode::from(json!(-4)).as_u64(), 0);
    }

    #[test]
    fn test_null_is_not_absent() {
        let node = ConfigNode::from(json!({"key": null}));
        assert!(node["key"].is_null());
        assert!(node["key"].exists());
        assert_eq!(node["key"].as_string(), "");
    }

    #[test]
    fn test_at_path() {
        let cfg = sample();
        assert_eq!(cfg.at("server.port").as_i64(), 8080);
        assert_eq!(cfg.at("features[0]").as_str(), "a");
        assert!(cfg.at("server.missing.deeper").is_absent());
    }

    #[test]
    fn test_mapping_equality_ignores_order() {
        let a = ConfigNode::from(json!({"x": 1, "y": 2}));
        let b = ConfigNode::from(json!({"y": 2, "x": 1}));
        assert_eq!(a, b);
        assert_eq!(a.keys().collect::<Vec<_>>(), vec!["x", "y"]);
        assert_eq!(b.keys().collect::<Vec<_>>(), vec!["y", "x"]);
    }

    #[test]
    fn test_clone_is_independent() {
        let original = sample();
        let mut copy = original.clone();
        if let ConfigNode::Mapping(fields) = &mut copy {
            fields.insert("server".to_string(), ConfigNode::from(json!("replaced")));
        }
        assert_eq!(original["server"]["port"].as_i64(), 8080);
        assert_eq!(copy["server"].as_str(), "replaced");
    }

    #[test]
    fn test_json_conversion() {
        let value = json!({"a": [1, {"b": null}], "c": "d"});
        let node = ConfigNode::from(value.clone());
        assert_eq!(node.to_json(), value);
        assert_eq!(serde_json::to_value(&node).unwrap(), value);
        assert_eq!(ConfigNode::Absent.to_json(), Value::Null);
    }

    #[test]
    fn test_deserialize_subtree() {
        #[derive(Deserialize)]
        struct Server {
            host: String,
            port: u16,
        }

        let cfg = sample();
        let server: Server = cfg["server"].deserialize().unwrap();
        assert_eq!(server.host, "localhost");
        assert_eq!(server.port, 8080);
    }
}
