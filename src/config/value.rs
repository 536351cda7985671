//! Tagged document value for configuration trees
//!
//! `ConfigValue` is the dynamic representation every composed configuration
//! passes through: schema defaults are expanded into it, overrides are applied
//! to it, interpolations are resolved inside it, and the instantiator walks it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Marker for a required field that has not been set yet.
///
/// Kept as a plain string so configuration documents written by this crate
/// stay interchangeable with ones written by the original tooling.
pub const MISSING: &str = "???";

/// A configuration value: scalar, list, or string-keyed map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ConfigValue>),
    Map(BTreeMap<String, ConfigValue>),
}

impl ConfigValue {
    /// The required-but-unset marker.
    pub fn missing() -> Self {
        ConfigValue::Str(MISSING.to_string())
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, ConfigValue::Str(s) if s == MISSING)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ConfigValue::Null)
    }

    /// Empty map, the starting point for schema expansion.
    pub fn empty_map() -> Self {
        ConfigValue::Map(BTreeMap::new())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric accessor that widens integers, since YAML writes `1.0` as `1`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Float(f) => Some(*f),
            ConfigValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, ConfigValue>> {
        match self {
            ConfigValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut BTreeMap<String, ConfigValue>> {
        match self {
            ConfigValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ConfigValue]> {
        match self {
            ConfigValue::List(l) => Some(l),
            _ => None,
        }
    }

    /// Look up a value by dotted path. Numeric segments index into lists.
    pub fn get_path(&self, path: &str) -> Option<&ConfigValue> {
        let mut current = self;
        for segment in path.split('.') {
            current = match current {
                ConfigValue::Map(map) => map.get(segment)?,
                ConfigValue::List(list) => list.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Set a value by dotted path. Every segment, including the final one,
    /// must already exist: overrides may not invent new fields (typo
    /// protection). Returns `false` when the path does not exist.
    pub fn set_path(&mut self, path: &str, value: ConfigValue) -> bool {
        let mut current = self;
        let segments: Vec<&str> = path.split('.').collect();
        for (i, segment) in segments.iter().enumerate() {
            let last = i + 1 == segments.len();
            match current {
                ConfigValue::Map(map) => match map.get_mut(*segment) {
                    Some(slot) if last => {
                        *slot = value;
                        return true;
                    }
                    Some(slot) => current = slot,
                    None => return false,
                },
                ConfigValue::List(list) => {
                    let index = match segment.parse::<usize>() {
                        Ok(i) => i,
                        Err(_) => return false,
                    };
                    match list.get_mut(index) {
                        Some(slot) if last => {
                            *slot = value;
                            return true;
                        }
                        Some(slot) => current = slot,
                        None => return false,
                    }
                }
                _ => return false,
            }
        }
        false
    }

    /// Collect the dotted paths of every string leaf, in tree order.
    /// Used by interpolation resolution and the final verification pass.
    pub fn string_leaf_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        self.collect_string_leaves("", &mut paths);
        paths
    }

    fn collect_string_leaves(&self, prefix: &str, out: &mut Vec<String>) {
        match self {
            ConfigValue::Str(_) => out.push(prefix.to_string()),
            ConfigValue::Map(map) => {
                for (key, value) in map {
                    let child = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{prefix}.{key}")
                    };
                    value.collect_string_leaves(&child, out);
                }
            }
            ConfigValue::List(list) => {
                for (index, value) in list.iter().enumerate() {
                    let child = if prefix.is_empty() {
                        index.to_string()
                    } else {
                        format!("{prefix}.{index}")
                    };
                    value.collect_string_leaves(&child, out);
                }
            }
            _ => {}
        }
    }

    /// Find the first missing-marker leaf, if any. Returns its dotted path.
    pub fn find_missing(&self) -> Option<String> {
        match self {
            ConfigValue::Str(s) if s == MISSING => Some(String::new()),
            ConfigValue::Map(map) => {
                for (key, value) in map {
                    if let Some(sub) = value.find_missing() {
                        return Some(join_path(key, &sub));
                    }
                }
                None
            }
            ConfigValue::List(list) => {
                for (index, value) in list.iter().enumerate() {
                    if let Some(sub) = value.find_missing() {
                        return Some(join_path(&index.to_string(), &sub));
                    }
                }
                None
            }
            _ => None,
        }
    }

    /// Render a scalar for embedding inside an interpolated string.
    pub fn render_scalar(&self) -> Option<String> {
        match self {
            ConfigValue::Null => Some("null".to_string()),
            ConfigValue::Bool(b) => Some(b.to_string()),
            ConfigValue::Int(i) => Some(i.to_string()),
            ConfigValue::Float(f) => Some(f.to_string()),
            ConfigValue::Str(s) => Some(s.clone()),
            _ => None,
        }
    }
}

fn join_path(head: &str, tail: &str) -> String {
    if tail.is_empty() {
        head.to_string()
    } else {
        format!("{head}.{tail}")
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.render_scalar() {
            Some(s) => write!(f, "{s}"),
            None => write!(f, "{}", serde_yaml::to_string(self).map_err(|_| fmt::Error)?),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(v: bool) -> Self {
        ConfigValue::Bool(v)
    }
}

impl From<i64> for ConfigValue {
    fn from(v: i64) -> Self {
        ConfigValue::Int(v)
    }
}

impl From<f64> for ConfigValue {
    fn from(v: f64) -> Self {
        ConfigValue::Float(v)
    }
}

impl From<&str> for ConfigValue {
    fn from(v: &str) -> Self {
        ConfigValue::Str(v.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(v: String) -> Self {
        ConfigValue::Str(v)
    }
}

impl<T: Into<ConfigValue>> From<Vec<T>> for ConfigValue {
    fn from(v: Vec<T>) -> Self {
        ConfigValue::List(v.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> ConfigValue {
        serde_yaml::from_str(
            r#"
trainer:
  max_epochs: null
  accelerator: auto
  gradient_clip_val: 5.0
  callbacks:
    - name: checkpoint
      monitor: validation_f1_score
tasks:
  classification:
    batch_size: 64
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_get_path_nested() {
        let tree = sample_tree();
        assert_eq!(
            tree.get_path("trainer.accelerator").unwrap().as_str(),
            Some("auto")
        );
        assert_eq!(
            tree.get_path("tasks.classification.batch_size")
                .unwrap()
                .as_i64(),
            Some(64)
        );
    }

    #[test]
    fn test_get_path_list_index() {
        let tree = sample_tree();
        assert_eq!(
            tree.get_path("trainer.callbacks.0.monitor").unwrap().as_str(),
            Some("validation_f1_score")
        );
        assert!(tree.get_path("trainer.callbacks.1").is_none());
    }

    #[test]
    fn test_set_path_existing_field() {
        let mut tree = sample_tree();
        assert!(tree.set_path("trainer.max_epochs", ConfigValue::Int(10)));
        assert_eq!(tree.get_path("trainer.max_epochs").unwrap().as_i64(), Some(10));
    }

    #[test]
    fn test_set_path_unknown_field_rejected() {
        let mut tree = sample_tree();
        assert!(!tree.set_path("trainer.max_epoch", ConfigValue::Int(10)));
        assert!(!tree.set_path("tasks.unknown_task.foo", ConfigValue::Int(1)));
    }

    #[test]
    fn test_set_path_replaces_whole_subtree() {
        let mut tree = sample_tree();
        let replacement: ConfigValue = serde_yaml::from_str("{batch_size: 8}").unwrap();
        assert!(tree.set_path("tasks.classification", replacement));
        assert_eq!(
            tree.get_path("tasks.classification.batch_size")
                .unwrap()
                .as_i64(),
            Some(8)
        );
    }

    #[test]
    fn test_missing_marker() {
        let mut tree = sample_tree();
        assert!(tree.find_missing().is_none());
        tree.set_path("trainer.accelerator", ConfigValue::missing());
        assert_eq!(tree.find_missing().as_deref(), Some("trainer.accelerator"));
    }

    #[test]
    fn test_untagged_int_stays_int() {
        let v: ConfigValue = serde_yaml::from_str("10").unwrap();
        assert_eq!(v, ConfigValue::Int(10));
        let v: ConfigValue = serde_yaml::from_str("0.5").unwrap();
        assert_eq!(v, ConfigValue::Float(0.5));
    }

    #[test]
    fn test_string_leaf_paths() {
        let tree = sample_tree();
        let leaves = tree.string_leaf_paths();
        assert!(leaves.contains(&"trainer.accelerator".to_string()));
        assert!(leaves.contains(&"trainer.callbacks.0.name".to_string()));
    }

    #[test]
    fn test_render_scalar() {
        assert_eq!(ConfigValue::Int(3).render_scalar().as_deref(), Some("3"));
        assert_eq!(ConfigValue::Null.render_scalar().as_deref(), Some("null"));
        assert!(ConfigValue::empty_map().render_scalar().is_none());
    }
}
