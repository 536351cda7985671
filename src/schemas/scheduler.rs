//! Learning-rate scheduler schemas, constructed partially.

use crate::config::{SchemaError, SchemaNode, SchemaRegistry};

pub(super) fn register(registry: &mut SchemaRegistry) -> Result<(), SchemaError> {
    // Wrapper fields shared by every scheduler: what to monitor and how
    // often the schedule steps.
    registry.register(
        SchemaNode::new("scheduler_schema")
            .partial()
            .field("monitor", "validation_f1_score")
            .field("interval", "epoch")
            .field("frequency", 1i64),
    )?;
    registry.register(
        SchemaNode::new("plateau_scheduler")
            .extends("scheduler_schema")
            .target("moderar.optim.plateau_scheduler")
            .field("mode", "max")
            .field("factor", 0.1)
            .field("patience", 5i64),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::compose;

    #[test]
    fn test_plateau_inherits_wrapper_fields() {
        let mut registry = SchemaRegistry::new();
        register(&mut registry).unwrap();
        let config = compose(&registry, "plateau_scheduler", &[]).unwrap();
        assert_eq!(
            config.get("monitor").unwrap().as_str(),
            Some("validation_f1_score")
        );
        assert_eq!(config.get("patience").unwrap().as_i64(), Some(5));
        assert_eq!(config.get("_partial_").unwrap().as_bool(), Some(true));
    }
}
