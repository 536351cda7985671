//! Declarative schema definitions
//!
//! Every configuration node the pipeline understands, registered into a
//! [`SchemaRegistry`]. Grouped by subsystem the way the runtime is: trainer,
//! optimizer, scheduler, model, data module, tasks, infrastructure, and the
//! experiment nodes that tie them together.

mod data_module;
mod experiment;
mod infrastructure;
mod model;
mod optimizer;
mod scheduler;
mod task;
mod trainer;

use crate::config::{SchemaError, SchemaRegistry};

/// Register every built-in schema. Idempotent: registering the same set into
/// a registry that already holds it is a no-op.
pub fn register_defaults(registry: &mut SchemaRegistry) -> Result<(), SchemaError> {
    trainer::register(registry)?;
    optimizer::register(registry)?;
    scheduler::register(registry)?;
    model::register(registry)?;
    data_module::register(registry)?;
    task::register(registry)?;
    infrastructure::register(registry)?;
    experiment::register(registry)?;
    Ok(())
}

/// A registry pre-loaded with the built-in schemas.
pub fn default_registry() -> Result<SchemaRegistry, SchemaError> {
    let mut registry = SchemaRegistry::new();
    register_defaults(&mut registry)?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::compose;

    #[test]
    fn test_register_defaults_is_idempotent() {
        let mut registry = default_registry().unwrap();
        register_defaults(&mut registry).unwrap();
    }

    #[test]
    fn test_every_leaf_schema_is_reachable() {
        let registry = default_registry().unwrap();
        for name in [
            "gpu_prod_trainer",
            "adamw_optimizer",
            "plateau_scheduler",
            "tiny_binary_text_classification_model",
            "text_classification_data_module",
            "default_training_task",
            "common_evaluation_task",
            "local_tiny",
        ] {
            assert!(registry.contains(name), "schema '{name}' not registered");
        }
    }

    #[test]
    fn test_local_tiny_composes() {
        let registry = default_registry().unwrap();
        let config = compose(&registry, "local_tiny", &[]).unwrap();
        assert_eq!(config.get("seed").unwrap().as_i64(), Some(1234));
        assert_eq!(
            config
                .get("tasks.cyberbullying_training.task_name")
                .unwrap()
                .as_str(),
            Some("cyberbullying_training")
        );
        // The evaluation task points at the training task's export.
        assert_eq!(
            config.get("tasks.cyberbullying_evaluation.tar_model_path"),
            config.get("tasks.cyberbullying_training.tar_model_export_path"),
        );
    }
}
