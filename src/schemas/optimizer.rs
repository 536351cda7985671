//! Optimizer schemas: the depth-3 adam chain, constructed partially.

use crate::config::{ConfigValue, SchemaError, SchemaNode, SchemaRegistry};

pub(super) fn register(registry: &mut SchemaRegistry) -> Result<(), SchemaError> {
    registry.register(
        SchemaNode::new("optimizer_schema")
            .partial()
            .required("lr")
            .field("weight_decay", 0.0),
    )?;
    registry.register(
        SchemaNode::new("adam_optimizer")
            .extends("optimizer_schema")
            .target("moderar.optim.adam")
            .field(
                "betas",
                ConfigValue::List(vec![ConfigValue::Float(0.9), ConfigValue::Float(0.999)]),
            )
            .field("eps", 1.0e-8),
    )?;
    registry.register(
        SchemaNode::new("adamw_optimizer")
            .extends("adam_optimizer")
            .target("moderar.optim.adamw")
            .field("weight_decay", 0.01),
    )?;
    Ok(())
}
