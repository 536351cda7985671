//! Schema node definitions
//!
//! A `SchemaNode` is one typed configuration unit: a set of named fields with
//! defaults, required markers, or nested schema references. Specialization is
//! "base + diff": a node names a single parent and only lists the fields it
//! overrides; everything else falls through to the closest ancestor.

use serde::{Deserialize, Serialize};

use super::value::ConfigValue;

/// Reference to a nested schema, optionally with field tweaks applied after
/// the nested defaults are expanded (`scheduler: plateau(patience=5)` style).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRef {
    pub schema: String,
    pub tweaks: Vec<(String, ConfigValue)>,
}

impl NodeRef {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            tweaks: Vec::new(),
        }
    }

    pub fn tweak(mut self, path: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.tweaks.push((path.into(), value.into()));
        self
    }
}

/// One field declaration on a schema node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldDef {
    /// Must be concretely set before instantiation.
    Required,
    /// Literal default. Strings containing `${...}` resolve at composition.
    Value(ConfigValue),
    /// Nested schema expanded in place.
    Node(NodeRef),
    /// List of nested schemas (callbacks, loggers).
    NodeList(Vec<NodeRef>),
}

/// A named schema node with an optional specialization parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaNode {
    pub name: String,
    pub parent: Option<String>,
    /// Declaration order is preserved; later declarations of the same field
    /// within one node win, matching override semantics.
    pub fields: Vec<(String, FieldDef)>,
}

impl SchemaNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            fields: Vec::new(),
        }
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Discriminator naming the constructor for this node.
    pub fn target(self, target: impl Into<String>) -> Self {
        self.field("_target_", ConfigValue::Str(target.into()))
    }

    /// Mark the node for deferred (partial) construction.
    pub fn partial(self) -> Self {
        self.field("_partial_", ConfigValue::Bool(true))
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.fields.push((name.into(), FieldDef::Value(value.into())));
        self
    }

    pub fn required(mut self, name: impl Into<String>) -> Self {
        self.fields.push((name.into(), FieldDef::Required));
        self
    }

    pub fn node(mut self, name: impl Into<String>, node: NodeRef) -> Self {
        self.fields.push((name.into(), FieldDef::Node(node)));
        self
    }

    pub fn node_list(mut self, name: impl Into<String>, nodes: Vec<NodeRef>) -> Self {
        self.fields.push((name.into(), FieldDef::NodeList(nodes)));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_preserves_declaration_order() {
        let node = SchemaNode::new("trainer_schema")
            .target("moderar.runtime.trainer")
            .field("accelerator", "auto")
            .field("max_epochs", ConfigValue::Null)
            .required("devices");

        assert_eq!(node.fields.len(), 4);
        assert_eq!(node.fields[0].0, "_target_");
        assert_eq!(node.fields[3], ("devices".to_string(), FieldDef::Required));
    }

    #[test]
    fn test_extends_sets_parent() {
        let node = SchemaNode::new("gpu_dev_trainer").extends("trainer_schema");
        assert_eq!(node.parent.as_deref(), Some("trainer_schema"));
    }

    #[test]
    fn test_node_ref_tweaks() {
        let node_ref = NodeRef::new("plateau_scheduler").tweak("patience", 5i64);
        assert_eq!(node_ref.tweaks, vec![("patience".to_string(), ConfigValue::Int(5))]);
    }

    #[test]
    fn test_partial_flag_is_plain_field() {
        let node = SchemaNode::new("optimizer_schema").partial().required("lr");
        assert_eq!(
            node.fields[0],
            (
                "_partial_".to_string(),
                FieldDef::Value(ConfigValue::Bool(true))
            )
        );
    }
}
