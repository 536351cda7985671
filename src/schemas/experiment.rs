//! Root configuration and experiment schemas
//!
//! `config_schema` is the root shape every run composes; an experiment node
//! specializes it with a concrete task map. `local_tiny` trains the tiny
//! classifier on local TSV splits and evaluates the exported archive; the
//! evaluation task reuses the training task's data module, trainer, and
//! export path through cross-task references.

use crate::config::{NodeRef, SchemaError, SchemaNode, SchemaRegistry};

pub(super) fn register(registry: &mut SchemaRegistry) -> Result<(), SchemaError> {
    registry.register(
        SchemaNode::new("config_schema")
            .field("seed", 1234i64)
            .field("work_dir", "./data/work")
            .node("infrastructure", NodeRef::new("infrastructure_schema"))
            .required("tasks"),
    )?;

    registry.register(
        SchemaNode::new("local_tiny_tasks")
            .node(
                "cyberbullying_training",
                NodeRef::new("default_training_task")
                    .tweak("task_name", "cyberbullying_training")
                    .tweak("data_module.train_df_path", "./data/train.tsv")
                    .tweak("data_module.valid_df_path", "./data/valid.tsv")
                    .tweak("data_module.test_df_path", "./data/test.tsv"),
            )
            .node(
                "cyberbullying_evaluation",
                NodeRef::new("common_evaluation_task")
                    .tweak("task_name", "cyberbullying_evaluation")
                    .tweak(
                        "tar_model_path",
                        "${tasks.cyberbullying_training.tar_model_export_path}",
                    )
                    .tweak("data_module", "${tasks.cyberbullying_training.data_module}")
                    .tweak("trainer", "${tasks.cyberbullying_training.trainer}"),
            ),
    )?;

    registry.register(
        SchemaNode::new("local_tiny")
            .extends("config_schema")
            .node("tasks", NodeRef::new("local_tiny_tasks")),
    )?;
    Ok(())
}
