//! Deep merge for hierarchical config files.
//!
//! Implements field-by-field merging where more specific levels override
//! their ancestors. Arrays follow a per-path [`ArrayMergeStrategy`]
//! (override by default).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// How an array at one field path combines across hierarchy levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrayMergeStrategy {
    /// The more specific array replaces the ancestor's.
    #[default]
    Override,
    /// Ancestor elements first, then the more specific ones.
    Append,
    /// More specific elements first, then the ancestor's.
    Prepend,
}

impl fmt::Display for ArrayMergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArrayMergeStrategy::Override => "override",
            ArrayMergeStrategy::Append => "append",
            ArrayMergeStrategy::Prepend => "prepend",
        })
    }
}

impl FromStr for ArrayMergeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "override" | "replace" => Ok(ArrayMergeStrategy::Override),
            "append" => Ok(ArrayMergeStrategy::Append),
            "prepend" => Ok(ArrayMergeStrategy::Prepend),
            other => Err(format!("unknown array merge strategy: {other}")),
        }
    }
}

/// Array strategies keyed by dot-separated field path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MergePolicy {
    arrays: HashMap<String, ArrayMergeStrategy>,
}

impl MergePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_array(mut self, path: impl Into<String>, strategy: ArrayMergeStrategy) -> Self {
        self.arrays.insert(path.into(), strategy);
        self
    }

    pub fn strategy_for(&self, path: &str) -> ArrayMergeStrategy {
        self.arrays.get(path).copied().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }
}

/// Deep merge two JSON values, with `overlay` taking precedence over `base`.
///
/// - Objects are merged recursively: keys in overlay override keys in base
/// - Arrays, strings, numbers, booleans, nulls are replaced entirely
/// - If overlay is null, the base value is preserved (null means "not specified")
///
/// # Example
/// ```
/// use serde_json::json;
/// use mcp_config_resolver::merge::deep_merge;
///
/// let base = json!({
///     "server": { "port": 8080, "host": "localhost" },
///     "features": ["a", "b"]
/// });
/// let overlay = json!({
///     "server": { "port": 9000 },
///     "features": ["c"]
/// });
/// let result = deep_merge(base, overlay);
/// assert_eq!(result["server"]["host"], "localhost");
/// assert_eq!(result["features"], json!(["c"]));
/// ```
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    merge_at(base, overlay, "", &MergePolicy::default())
}

/// [`deep_merge`] with per-path array strategies.
pub fn deep_merge_with(base: Value, overlay: Value, policy: &MergePolicy) -> Value {
    merge_at(base, overlay, "", policy)
}

fn merge_at(base: Value, overlay: Value, path: &str, policy: &MergePolicy) -> Value {
    match (base, overlay) {
        // Both are objects: merge recursively
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let child_path = join_path(path, &key);
                let merged_value = if let Some(base_value) = base_map.remove(&key) {
                    merge_at(base_value, overlay_value, &child_path, policy)
                } else {
                    overlay_value
                };
                base_map.insert(key, merged_value);
            }
            Value::Object(base_map)
        }
        (Value::Array(base_items), Value::Array(overlay_items)) => {
            match policy.strategy_for(path) {
                ArrayMergeStrategy::Override => Value::Array(overlay_items),
                ArrayMergeStrategy::Append => {
                    Value::Array(base_items.into_iter().chain(overlay_items).collect())
                }
                ArrayMergeStrategy::Prepend => {
                    Value::Array(overlay_items.into_iter().chain(base_items).collect())
                }
            }
        }
        // Overlay is null: preserve base (null means "not specified")
        (base, Value::Null) => base,
        // Any other case: overlay replaces base entirely
        (_, overlay) => overlay,
    }
}

/// Merge multiple values in order, with later values taking precedence.
///
/// Equivalent to folding `deep_merge` over the list.
pub fn deep_merge_all(values: impl IntoIterator<Item = Value>) -> Value {
    values.into_iter().fold(Value::Null, deep_merge)
}

/// A merged value plus which level supplied each leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedLevels {
    pub value: Value,
    /// Leaf path to the label of the most specific level that set it.
    pub provenance: BTreeMap<String, String>,
}

/// Merge hierarchy levels given most specific first.
///
/// Levels are folded from the least specific upward so every more specific
/// level overrides (or extends, per `policy`) its ancestors.
pub fn merge_levels<L: Into<String>>(
    levels: Vec<(L, Value)>,
    policy: &MergePolicy,
) -> MergedLevels {
    let mut value = Value::Object(Map::new());
    let mut provenance = BTreeMap::new();

    for (label, level) in levels.into_iter().rev() {
        let label = label.into();
        let mut leaves = Vec::new();
        collect_leaves(&level, "", &mut leaves);
        for leaf in leaves {
            provenance.insert(leaf, label.clone());
        }
        value = deep_merge_with(value, level, policy);
    }

    MergedLevels { value, provenance }
}

fn collect_leaves(value: &Value, path: &str, out: &mut Vec<String>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                collect_leaves(child, &join_path(path, key), out);
            }
        }
        Value::Null => {}
        _ if !path.is_empty() => out.push(path.to_string()),
        _ => {}
    }
}

pub(crate) fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}
