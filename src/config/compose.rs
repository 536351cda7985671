//! Configuration composition
//!
//! `compose` turns a registered schema name plus an ordered override list
//! into one fully concrete configuration tree:
//!
//! 1. defaults are expanded along the inheritance chain, closest ancestor
//!    wins for fields the specialization does not override;
//! 2. overrides apply in list order by dotted path, last write wins, and a
//!    path that does not exist on the tree fails loudly;
//! 3. interpolated references resolve lazily with cycle detection;
//! 4. a final pass verifies no required field is left unset and no
//!    reference is left unresolved.

use std::collections::BTreeMap;

use thiserror::Error;

use super::interpolate;
use super::registry::{SchemaError, SchemaRegistry};
use super::schema::{FieldDef, NodeRef};
use super::value::ConfigValue;

#[derive(Debug, Error)]
pub enum CompositionError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Override path not found: '{0}'")]
    UnknownOverridePath(String),

    #[error("Required field left unset: '{0}'")]
    MissingRequired(String),

    #[error("Unresolved interpolation at '{path}': {detail}")]
    UnresolvedInterpolation { path: String, detail: String },

    #[error("Interpolation cycle through '{0}'")]
    InterpolationCycle(String),

    #[error("Invalid schema tweak '{path}' on schema '{schema}'")]
    InvalidTweak { schema: String, path: String },
}

/// A fully resolved, immutable configuration tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    tree: ConfigValue,
}

impl ResolvedConfig {
    pub fn tree(&self) -> &ConfigValue {
        &self.tree
    }

    pub fn get(&self, path: &str) -> Option<&ConfigValue> {
        self.tree.get_path(path)
    }

    pub fn to_yaml(&self) -> crate::Result<String> {
        serde_yaml::to_string(&self.tree)
            .map_err(|e| crate::Error::Serialization(format!("YAML serialization failed: {e}")))
    }

    pub fn save(&self, path: &std::path::Path) -> crate::Result<()> {
        std::fs::write(path, self.to_yaml()?)?;
        Ok(())
    }

    /// Consume the wrapper; the instantiator takes the tree exactly once.
    pub fn into_tree(self) -> ConfigValue {
        self.tree
    }
}

/// Compose a schema into a resolved configuration tree.
pub fn compose(
    registry: &SchemaRegistry,
    base_schema: &str,
    overrides: &[(String, ConfigValue)],
) -> Result<ResolvedConfig, CompositionError> {
    let mut tree = expand_defaults(registry, base_schema)?;

    for (path, value) in overrides {
        if !tree.set_path(path, value.clone()) {
            return Err(CompositionError::UnknownOverridePath(path.clone()));
        }
    }

    interpolate::resolve_tree(&mut tree)?;
    verify(&tree)?;

    Ok(ResolvedConfig { tree })
}

/// Expand a schema's full default tree, applying the inheritance chain
/// bottom-up: the most specific node's explicit fields take precedence.
fn expand_defaults(
    registry: &SchemaRegistry,
    name: &str,
) -> Result<ConfigValue, CompositionError> {
    let chain = registry.chain(name)?;
    let mut map: BTreeMap<String, ConfigValue> = BTreeMap::new();
    for node in chain {
        for (field, def) in &node.fields {
            let value = match def {
                FieldDef::Required => ConfigValue::missing(),
                FieldDef::Value(v) => v.clone(),
                FieldDef::Node(node_ref) => expand_node_ref(registry, node_ref)?,
                FieldDef::NodeList(refs) => ConfigValue::List(
                    refs.iter()
                        .map(|r| expand_node_ref(registry, r))
                        .collect::<Result<_, _>>()?,
                ),
            };
            map.insert(field.clone(), value);
        }
    }
    Ok(ConfigValue::Map(map))
}

fn expand_node_ref(
    registry: &SchemaRegistry,
    node_ref: &NodeRef,
) -> Result<ConfigValue, CompositionError> {
    let mut tree = expand_defaults(registry, &node_ref.schema)?;
    for (path, value) in &node_ref.tweaks {
        if !tree.set_path(path, value.clone()) {
            return Err(CompositionError::InvalidTweak {
                schema: node_ref.schema.clone(),
                path: path.clone(),
            });
        }
    }
    Ok(tree)
}

fn verify(tree: &ConfigValue) -> Result<(), CompositionError> {
    if let Some(path) = tree.find_missing() {
        return Err(CompositionError::MissingRequired(path));
    }
    for path in tree.string_leaf_paths() {
        let value = tree.get_path(&path).and_then(ConfigValue::as_str);
        if let Some(s) = value {
            if s.contains("${") {
                return Err(CompositionError::UnresolvedInterpolation {
                    path,
                    detail: "reference survived resolution".to_string(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::SchemaNode;

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry
            .register(
                SchemaNode::new("trainer_schema")
                    .target("trainer")
                    .field("accelerator", "auto")
                    .field("max_epochs", ConfigValue::Null)
                    .field("log_every_n_steps", 50i64)
                    .field("gradient_clip_val", 5.0),
            )
            .unwrap();
        registry
            .register(
                SchemaNode::new("gpu_dev_trainer")
                    .extends("trainer_schema")
                    .field("accelerator", "cuda")
                    .field("max_epochs", 3i64)
                    .field("log_every_n_steps", 1i64),
            )
            .unwrap();
        registry
            .register(
                SchemaNode::new("gpu_prod_trainer")
                    .extends("gpu_dev_trainer")
                    .field("max_epochs", 10i64)
                    .field("log_every_n_steps", 20i64),
            )
            .unwrap();
        registry
            .register(
                SchemaNode::new("task_schema")
                    .required("task_name")
                    .node("trainer", NodeRef::new("trainer_schema")),
            )
            .unwrap();
        registry
            .register(
                SchemaNode::new("config_schema")
                    .field("seed", 1234i64)
                    .node("tasks", NodeRef::new("tasks_group")),
            )
            .unwrap();
        registry
            .register(SchemaNode::new("tasks_group").node(
                "classification",
                NodeRef::new("task_schema").tweak("task_name", "classification"),
            ))
            .unwrap();
        registry
    }

    fn no_overrides() -> Vec<(String, ConfigValue)> {
        Vec::new()
    }

    #[test]
    fn test_defaults_from_base() {
        let config = compose(&registry(), "trainer_schema", &no_overrides()).unwrap();
        assert_eq!(config.get("accelerator").unwrap().as_str(), Some("auto"));
        assert_eq!(config.get("max_epochs").unwrap(), &ConfigValue::Null);
        assert_eq!(config.get("_target_").unwrap().as_str(), Some("trainer"));
    }

    #[test]
    fn test_child_overrides_win_unset_fields_inherit() {
        let config = compose(&registry(), "gpu_dev_trainer", &no_overrides()).unwrap();
        assert_eq!(config.get("accelerator").unwrap().as_str(), Some("cuda"));
        assert_eq!(config.get("max_epochs").unwrap().as_i64(), Some(3));
        // Not overridden by the child, falls through to the base default.
        assert_eq!(config.get("gradient_clip_val").unwrap().as_f64(), Some(5.0));
        assert_eq!(config.get("_target_").unwrap().as_str(), Some("trainer"));
    }

    #[test]
    fn test_depth_three_chain_closest_ancestor_wins() {
        let config = compose(&registry(), "gpu_prod_trainer", &no_overrides()).unwrap();
        assert_eq!(config.get("max_epochs").unwrap().as_i64(), Some(10));
        // Set two levels up, untouched since.
        assert_eq!(config.get("accelerator").unwrap().as_str(), Some("cuda"));
        assert_eq!(config.get("gradient_clip_val").unwrap().as_f64(), Some(5.0));
    }

    #[test]
    fn test_override_null_field() {
        let overrides = vec![("trainer.max_epochs".to_string(), ConfigValue::Int(10))];
        let mut registry = registry();
        registry
            .register(
                SchemaNode::new("wrapper")
                    .node("trainer", NodeRef::new("trainer_schema"))
                    .field("task_name", "t"),
            )
            .unwrap();
        let config = compose(&registry, "wrapper", &overrides).unwrap();
        assert_eq!(config.get("trainer.max_epochs").unwrap().as_i64(), Some(10));
    }

    #[test]
    fn test_last_override_wins() {
        let overrides = vec![
            ("max_epochs".to_string(), ConfigValue::Int(5)),
            ("max_epochs".to_string(), ConfigValue::Int(7)),
        ];
        let config = compose(&registry(), "gpu_dev_trainer", &overrides).unwrap();
        assert_eq!(config.get("max_epochs").unwrap().as_i64(), Some(7));
    }

    #[test]
    fn test_unknown_override_path_fails_with_path() {
        let overrides = vec![(
            "tasks.unknown_task.foo".to_string(),
            ConfigValue::Int(1),
        )];
        let err = compose(&registry(), "config_schema", &overrides).unwrap_err();
        match err {
            CompositionError::UnknownOverridePath(path) => {
                assert_eq!(path, "tasks.unknown_task.foo")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_required_field_unset_fails() {
        let mut registry = SchemaRegistry::new();
        registry
            .register(SchemaNode::new("needs_lr").required("lr"))
            .unwrap();
        let err = compose(&registry, "needs_lr", &no_overrides()).unwrap_err();
        assert!(matches!(err, CompositionError::MissingRequired(p) if p == "lr"));
    }

    #[test]
    fn test_required_field_satisfied_by_override() {
        let mut registry = SchemaRegistry::new();
        registry
            .register(SchemaNode::new("needs_lr").required("lr"))
            .unwrap();
        let overrides = vec![("lr".to_string(), ConfigValue::Float(3e-5))];
        let config = compose(&registry, "needs_lr", &overrides).unwrap();
        assert_eq!(config.get("lr").unwrap().as_f64(), Some(3e-5));
    }

    #[test]
    fn test_override_with_interpolated_value() {
        let overrides = vec![
            (
                "tasks.classification.trainer.max_epochs".to_string(),
                ConfigValue::Int(4),
            ),
            (
                "seed".to_string(),
                ConfigValue::Str("${tasks.classification.trainer.max_epochs}".to_string()),
            ),
        ];
        let config = compose(&registry(), "config_schema", &overrides).unwrap();
        assert_eq!(config.get("seed").unwrap().as_i64(), Some(4));
    }

    #[test]
    fn test_composition_deterministic() {
        let overrides = vec![
            ("max_epochs".to_string(), ConfigValue::Int(2)),
            ("accelerator".to_string(), ConfigValue::Str("cpu".into())),
        ];
        let a = compose(&registry(), "gpu_prod_trainer", &overrides).unwrap();
        let b = compose(&registry(), "gpu_prod_trainer", &overrides).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_yaml().unwrap(), b.to_yaml().unwrap());
    }

    #[test]
    fn test_nested_tweaks_applied() {
        let config = compose(&registry(), "config_schema", &no_overrides()).unwrap();
        assert_eq!(
            config.get("tasks.classification.task_name").unwrap().as_str(),
            Some("classification")
        );
    }

    #[test]
    fn test_node_list_expands_each_reference() {
        let mut registry = registry();
        registry
            .register(SchemaNode::new("checkpoint_callback").field("monitor", "validation_f1_score"))
            .unwrap();
        registry
            .register(
                SchemaNode::new("with_callbacks").node_list(
                    "callbacks",
                    vec![
                        NodeRef::new("checkpoint_callback"),
                        NodeRef::new("checkpoint_callback").tweak("monitor", "train_loss"),
                    ],
                ),
            )
            .unwrap();
        let config = compose(&registry, "with_callbacks", &no_overrides()).unwrap();
        assert_eq!(
            config.get("callbacks.0.monitor").unwrap().as_str(),
            Some("validation_f1_score")
        );
        assert_eq!(
            config.get("callbacks.1.monitor").unwrap().as_str(),
            Some("train_loss")
        );
    }

    #[test]
    fn test_invalid_tweak_fails() {
        let mut registry = registry();
        registry
            .register(SchemaNode::new("broken").node(
                "trainer",
                NodeRef::new("trainer_schema").tweak("not_a_field", 1i64),
            ))
            .unwrap();
        assert!(matches!(
            compose(&registry, "broken", &no_overrides()),
            Err(CompositionError::InvalidTweak { .. })
        ));
    }
}
