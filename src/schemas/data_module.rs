//! Data module schemas. Split paths are required: experiments name them.

use crate::config::{SchemaError, SchemaNode, SchemaRegistry};

pub(super) fn register(registry: &mut SchemaRegistry) -> Result<(), SchemaError> {
    registry.register(
        SchemaNode::new("data_module_schema")
            .partial()
            .required("train_df_path")
            .required("valid_df_path")
            .required("test_df_path")
            .field("batch_size", 64i64)
            .field("drop_last", false),
    )?;
    registry.register(
        SchemaNode::new("text_classification_data_module")
            .extends("data_module_schema")
            .target("moderar.data.text_classification_data_module")
            .field("text_column_name", "cleaned_text")
            .field("label_column_name", "label"),
    )?;
    Ok(())
}
