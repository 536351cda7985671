//! Trainer schemas: base plus GPU dev/prod specializations.

use crate::config::{ConfigValue, SchemaError, SchemaNode, SchemaRegistry};

pub(super) fn register(registry: &mut SchemaRegistry) -> Result<(), SchemaError> {
    registry.register(
        SchemaNode::new("trainer_schema")
            .target("moderar.runtime.trainer")
            .field("accelerator", "auto")
            .field("max_epochs", ConfigValue::Null)
            .field("log_every_n_steps", 50i64)
            .field("gradient_clip_val", ConfigValue::Null)
            .field("limit_train_batches", 1.0)
            .field("limit_val_batches", 1.0)
            .field("limit_test_batches", 1.0)
            .field("default_root_dir", "./data"),
    )?;
    registry.register(
        SchemaNode::new("gpu_dev_trainer")
            .extends("trainer_schema")
            .field("accelerator", "gpu")
            .field("max_epochs", 3i64)
            .field("log_every_n_steps", 1i64)
            .field("limit_train_batches", 0.1)
            .field("limit_val_batches", 0.1)
            .field("limit_test_batches", 0.1),
    )?;
    registry.register(
        SchemaNode::new("gpu_prod_trainer")
            .extends("gpu_dev_trainer")
            .field("max_epochs", 10i64)
            .field("log_every_n_steps", 20i64)
            .field("gradient_clip_val", 5.0)
            .field("limit_train_batches", 1.0)
            .field("limit_val_batches", 1.0)
            .field("limit_test_batches", 1.0),
    )?;
    Ok(())
}
