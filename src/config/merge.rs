//! Layered merge of configuration trees.
//!
//! `overlay` takes precedence over `base`:
//! - [`ConfigNode::Absent`] on either side yields the other side unchanged
//! - Mappings are merged recursively over the union of their keys
//! - Sequences accumulate: base items first, then overlay items
//! - Anything else (scalars, mismatched variants): overlay replaces base
//!
//! Merge is total and associative but not commutative, so folding any number
//! of layers in a fixed order is well defined.

use crate::node::{ConfigNode, Mapping};

/// Merge two trees without consuming them.
///
/// Mapping results list base keys first (in base order) followed by keys only
/// the overlay defines.
pub fn merge(overlay: &ConfigNode, base: &ConfigNode) -> ConfigNode {
    match (overlay, base) {
        (ConfigNode::Absent, base) => base.clone(),
        (overlay, ConfigNode::Absent) => overlay.clone(),
        (ConfigNode::Mapping(overlay_map), ConfigNode::Mapping(base_map)) => {
            let mut merged = Mapping::with_capacity(base_map.len() + overlay_map.len());
            for (key, base_value) in base_map {
                let value = match overlay_map.get(key) {
                    Some(overlay_value) => merge(overlay_value, base_value),
                    None => base_value.clone(),
                };
                merged.insert(key.clone(), value);
            }
            for (key, overlay_value) in overlay_map {
                if !base_map.contains_key(key) {
                    merged.insert(key.clone(), overlay_value.clone());
                }
            }
            ConfigNode::Mapping(merged)
        }
        (ConfigNode::Sequence(overlay_items), ConfigNode::Sequence(base_items)) => {
            ConfigNode::Sequence(base_items.iter().chain(overlay_items).cloned().collect())
        }
        (overlay, _) => overlay.clone(),
    }
}

/// Owning variant of [`merge`], used when folding freshly parsed layers.
pub fn merge_owned(overlay: ConfigNode, base: ConfigNode) -> ConfigNode {
    match (overlay, base) {
        (ConfigNode::Absent, base) => base,
        (overlay, ConfigNode::Absent) => overlay,
        (ConfigNode::Mapping(overlay_map), ConfigNode::Mapping(mut base_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(slot) => {
                        let base_value = std::mem::take(slot);
                        *slot = merge_owned(overlay_value, base_value);
                    }
                    None => {
                        base_map.insert(key, overlay_value);
                    }
                }
            }
            ConfigNode::Mapping(base_map)
        }
        (ConfigNode::Sequence(overlay_items), ConfigNode::Sequence(mut base_items)) => {
            base_items.extend(overlay_items);
            ConfigNode::Sequence(base_items)
        }
        (overlay, _) => overlay,
    }
}

/// Fold layers in order, later layers taking precedence.
///
/// Equivalent to `merge(last, merge(.., merge(second, first)))`.
pub fn merge_all(layers: impl IntoIterator<Item = ConfigNode>) -> ConfigNode {
    layers
        .into_iter()
        .fold(ConfigNode::Absent, |acc, layer| merge_owned(layer, acc))
}
