//! Task and module schemas: the depth-4 training chain and the evaluation
//! chain, plus the training/evaluation module nodes they compose.

use crate::config::{NodeRef, SchemaError, SchemaNode, SchemaRegistry};

pub(super) fn register(registry: &mut SchemaRegistry) -> Result<(), SchemaError> {
    registry
        .register(SchemaNode::new("bce_loss_schema").target("moderar.losses.bce_loss"))?;
    registry.register(
        SchemaNode::new("training_module_schema")
            .target("moderar.modules.training_module")
            .node("model", NodeRef::new("tiny_binary_text_classification_model"))
            .node("loss", NodeRef::new("bce_loss_schema"))
            .node("optimizer", NodeRef::new("adamw_optimizer"))
            .node("scheduler", NodeRef::new("plateau_scheduler")),
    )?;
    registry.register(
        SchemaNode::new("evaluation_module_schema")
            .target("moderar.modules.evaluation_module")
            .partial(),
    )?;

    registry.register(SchemaNode::new("task_schema").required("task_name"))?;
    registry.register(
        SchemaNode::new("training_task")
            .extends("task_schema")
            .node("trainer", NodeRef::new("trainer_schema"))
            .node("module", NodeRef::new("training_module_schema"))
            .node("data_module", NodeRef::new("text_classification_data_module")),
    )?;
    registry.register(
        SchemaNode::new("tar_model_exporting_training_task")
            .extends("training_task")
            .target("moderar.tasks.tar_model_exporting_training_task")
            .field(
                "checkpoint_path",
                "${.trainer.default_root_dir}/checkpoints/last.safetensors",
            )
            .required("tar_model_export_path"),
    )?;
    registry.register(
        SchemaNode::new("default_training_task")
            .extends("tar_model_exporting_training_task")
            .field(
                "tar_model_export_path",
                "${.trainer.default_root_dir}/exported/model.tar.gz",
            )
            .node(
                "module",
                NodeRef::new("training_module_schema").tweak("optimizer.lr", 3.0e-4),
            ),
    )?;

    registry.register(
        SchemaNode::new("evaluation_task")
            .extends("task_schema")
            .node("trainer", NodeRef::new("trainer_schema"))
            .node("module", NodeRef::new("evaluation_module_schema"))
            .node("data_module", NodeRef::new("text_classification_data_module")),
    )?;
    registry.register(
        SchemaNode::new("common_evaluation_task")
            .extends("evaluation_task")
            .target("moderar.tasks.common_evaluation_task")
            .required("tar_model_path"),
    )?;
    Ok(())
}
