//! Built-in factory registrations
//!
//! Discriminators mirror the crate's module paths. Optimizer discriminators
//! are registered once per supported algorithm so the deferred factory can
//! recover the algorithm from its own target string.

use super::{Fields, Instance, InstantiationError, Instantiator};
use crate::config::ConfigValue;
use crate::runtime::data::PartialDataModule;
use crate::runtime::model::{
    BinaryTextClassificationModel, HashingBackbone, MeanPoolAdapter, SigmoidHead,
};
use crate::runtime::module::{BceLoss, PartialEvaluationModule, TrainingModule};
use crate::runtime::optim::{OptimizerFactory, SchedulerFactory};
use crate::runtime::task::{EvaluationTask, TrainingTask};
use crate::runtime::trainer::Trainer;

pub(super) fn register_builtins(instantiator: &mut Instantiator) {
    instantiator.register("moderar.models.hashing_backbone", hashing_backbone);
    instantiator.register("moderar.models.mean_pool_adapter", mean_pool_adapter);
    instantiator.register("moderar.models.sigmoid_head", sigmoid_head);
    instantiator.register(
        "moderar.models.binary_text_classification_model",
        binary_text_classification_model,
    );
    instantiator.register("moderar.losses.bce_loss", bce_loss);
    instantiator.register("moderar.optim.adam", optimizer);
    instantiator.register("moderar.optim.adamw", optimizer);
    instantiator.register("moderar.optim.sgd", optimizer);
    instantiator.register("moderar.optim.plateau_scheduler", plateau_scheduler);
    instantiator.register(
        "moderar.data.text_classification_data_module",
        text_classification_data_module,
    );
    instantiator.register("moderar.modules.training_module", training_module);
    instantiator.register("moderar.modules.evaluation_module", evaluation_module);
    instantiator.register("moderar.runtime.trainer", trainer);
    instantiator.register(
        "moderar.tasks.tar_model_exporting_training_task",
        tar_model_exporting_training_task,
    );
    instantiator.register("moderar.tasks.common_evaluation_task", common_evaluation_task);
}

/// Consume one argument expecting a specific instance variant.
macro_rules! extract {
    ($fields:expr, $name:expr, $variant:ident) => {
        match $fields.take($name)? {
            Instance::$variant(inner) => Ok(inner),
            other => Err($fields.err(format!(
                "argument '{}' is a {}, expected a {}",
                $name,
                other.kind(),
                stringify!($variant)
            ))),
        }
    };
}

fn hashing_backbone(fields: &mut Fields) -> Result<Instance, InstantiationError> {
    Ok(Instance::Backbone(HashingBackbone::new(
        fields.usize("vocab_size")?,
        fields.usize("embedding_dim")?,
        fields.usize("max_length")?,
        fields.u64("seed")?,
    )))
}

fn mean_pool_adapter(_fields: &mut Fields) -> Result<Instance, InstantiationError> {
    Ok(Instance::Adapter(MeanPoolAdapter))
}

fn sigmoid_head(fields: &mut Fields) -> Result<Instance, InstantiationError> {
    Ok(Instance::Head(SigmoidHead::new(
        fields.usize("in_features")?,
        fields.u64("seed")?,
    )))
}

fn binary_text_classification_model(
    fields: &mut Fields,
) -> Result<Instance, InstantiationError> {
    let backbone = extract!(fields, "backbone", Backbone)?;
    let adapter = extract!(fields, "adapter", Adapter)?;
    let head = extract!(fields, "head", Head)?;
    if head.weight.len() != backbone.embedding_dim {
        return Err(fields.err(format!(
            "head in_features {} does not match backbone embedding_dim {}",
            head.weight.len(),
            backbone.embedding_dim
        )));
    }
    Ok(Instance::Model(BinaryTextClassificationModel::new(
        backbone, adapter, head,
    )))
}

fn bce_loss(_fields: &mut Fields) -> Result<Instance, InstantiationError> {
    Ok(Instance::Loss(BceLoss))
}

fn optimizer(fields: &mut Fields) -> Result<Instance, InstantiationError> {
    let betas = betas(fields)?;
    Ok(Instance::Optimizer(OptimizerFactory {
        target: fields.target().to_string(),
        lr: fields.f64("lr")?,
        betas,
        eps: fields.f64("eps")?,
        weight_decay: fields.f64("weight_decay")?,
    }))
}

fn betas(fields: &mut Fields) -> Result<(f64, f64), InstantiationError> {
    let value = fields.value("betas")?;
    let pair: Vec<f64> = value
        .as_list()
        .map(|list| list.iter().filter_map(ConfigValue::as_f64).collect())
        .unwrap_or_default();
    match pair[..] {
        [b1, b2] => Ok((b1, b2)),
        _ => Err(fields.err(format!("argument 'betas' is not a pair of numbers: {value}"))),
    }
}

fn plateau_scheduler(fields: &mut Fields) -> Result<Instance, InstantiationError> {
    Ok(Instance::Scheduler(SchedulerFactory {
        target: fields.target().to_string(),
        mode: fields.str("mode")?,
        factor: fields.f64("factor")?,
        patience: fields.usize("patience")?,
        monitor: fields.str("monitor")?,
        interval: fields.str("interval")?,
        frequency: fields.usize("frequency")?,
    }))
}

fn text_classification_data_module(
    fields: &mut Fields,
) -> Result<Instance, InstantiationError> {
    Ok(Instance::DataModule(PartialDataModule {
        train_df_path: fields.path("train_df_path")?,
        valid_df_path: fields.path("valid_df_path")?,
        test_df_path: fields.path("test_df_path")?,
        batch_size: fields.usize("batch_size")?,
        text_column_name: fields.str("text_column_name")?,
        label_column_name: fields.str("label_column_name")?,
        drop_last: fields.bool("drop_last")?,
    }))
}

fn training_module(fields: &mut Fields) -> Result<Instance, InstantiationError> {
    let model = extract!(fields, "model", Model)?;
    let loss = extract!(fields, "loss", Loss)?;
    let optimizer = extract!(fields, "optimizer", Optimizer)?;
    let scheduler = extract!(fields, "scheduler", Scheduler)?;
    Ok(Instance::TrainingModule(TrainingModule::new(
        model, loss, optimizer, scheduler,
    )))
}

fn evaluation_module(_fields: &mut Fields) -> Result<Instance, InstantiationError> {
    Ok(Instance::EvaluationModule(PartialEvaluationModule))
}

fn trainer(fields: &mut Fields) -> Result<Instance, InstantiationError> {
    let log_every_n_steps = fields.usize("log_every_n_steps")?;
    if log_every_n_steps == 0 {
        return Err(fields.err("argument 'log_every_n_steps' must be at least 1"));
    }
    Ok(Instance::Trainer(Trainer {
        accelerator: fields.str("accelerator")?,
        max_epochs: fields.opt_usize("max_epochs")?,
        log_every_n_steps,
        gradient_clip_val: fields.opt_f64("gradient_clip_val")?,
        limit_train_batches: fields.f64("limit_train_batches")?,
        limit_val_batches: fields.f64("limit_val_batches")?,
        limit_test_batches: fields.f64("limit_test_batches")?,
        default_root_dir: fields.str("default_root_dir")?,
    }))
}

fn tar_model_exporting_training_task(
    fields: &mut Fields,
) -> Result<Instance, InstantiationError> {
    // The archive needs the raw model configuration, not the built model.
    let model_config = fields
        .raw("module")?
        .get_path("model")
        .cloned()
        .ok_or_else(|| fields.err("argument 'module' has no 'model' configuration"))?;
    let module = extract!(fields, "module", TrainingModule)?;
    Ok(Instance::TrainingTask(Box::new(TrainingTask {
        name: fields.str("task_name")?,
        module,
        data_module: extract!(fields, "data_module", DataModule)?,
        trainer: extract!(fields, "trainer", Trainer)?,
        model_config,
        checkpoint_path: fields.path("checkpoint_path")?,
        tar_model_export_path: fields.path("tar_model_export_path")?,
    })))
}

fn common_evaluation_task(fields: &mut Fields) -> Result<Instance, InstantiationError> {
    Ok(Instance::EvaluationTask(Box::new(EvaluationTask {
        name: fields.str("task_name")?,
        module: extract!(fields, "module", EvaluationModule)?,
        data_module: extract!(fields, "data_module", DataModule)?,
        trainer: extract!(fields, "trainer", Trainer)?,
        tar_model_path: fields.path("tar_model_path")?,
    })))
}
