//! Model schemas: backbone/adapter/head components and the assembled
//! classifier chain.

use crate::config::{NodeRef, SchemaError, SchemaNode, SchemaRegistry};

pub(super) fn register(registry: &mut SchemaRegistry) -> Result<(), SchemaError> {
    registry.register(
        SchemaNode::new("hashing_backbone_schema")
            .target("moderar.models.hashing_backbone")
            .field("vocab_size", 32768i64)
            .field("embedding_dim", 128i64)
            .field("max_length", 128i64)
            .field("seed", 1234i64),
    )?;
    registry.register(
        SchemaNode::new("mean_pool_adapter_schema").target("moderar.models.mean_pool_adapter"),
    )?;
    registry.register(
        SchemaNode::new("sigmoid_head_schema")
            .target("moderar.models.sigmoid_head")
            // The head width always follows the backbone it sits on.
            .field("in_features", "${..backbone.embedding_dim}")
            .field("seed", 1234i64),
    )?;
    registry.register(
        SchemaNode::new("model_schema")
            .required("backbone")
            .required("adapter")
            .required("head"),
    )?;
    registry.register(
        SchemaNode::new("binary_text_classification_model")
            .extends("model_schema")
            .target("moderar.models.binary_text_classification_model")
            .node("backbone", NodeRef::new("hashing_backbone_schema"))
            .node("adapter", NodeRef::new("mean_pool_adapter_schema"))
            .node("head", NodeRef::new("sigmoid_head_schema")),
    )?;
    registry.register(
        SchemaNode::new("tiny_binary_text_classification_model")
            .extends("binary_text_classification_model")
            .node(
                "backbone",
                NodeRef::new("hashing_backbone_schema")
                    .tweak("vocab_size", 4096i64)
                    .tweak("embedding_dim", 32i64)
                    .tweak("max_length", 64i64),
            ),
    )?;
    Ok(())
}
