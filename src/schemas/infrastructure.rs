//! Infrastructure schema: where tracking lives and where artifacts go.
//! Values come from the environment with local-development fallbacks.

use crate::config::{ConfigValue, SchemaError, SchemaNode, SchemaRegistry};

pub(super) fn register(registry: &mut SchemaRegistry) -> Result<(), SchemaError> {
    registry.register(
        SchemaNode::new("infrastructure_schema")
            .field(
                "tracking_uri",
                "${oc.env:MODERAR_TRACKING_URI,http://localhost:6101}",
            )
            .field(
                "experiment_name",
                "${env:MODERAR_EXPERIMENT,cyberbullying}",
            )
            .field("experiment_url", "${.tracking_uri}/#/experiments")
            .field(
                "artifact_location",
                "${oc.env:MODERAR_ARTIFACT_ROOT,./data/artifacts}",
            )
            .field("run_name", ConfigValue::Null),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::compose;

    #[test]
    fn test_env_defaults_and_relative_url() {
        let mut registry = SchemaRegistry::new();
        register(&mut registry).unwrap();
        let config = compose(&registry, "infrastructure_schema", &[]).unwrap();
        // Without the env vars set, the fallbacks win and the url is built
        // from the resolved tracking uri.
        assert_eq!(
            config.get("tracking_uri").unwrap().as_str(),
            Some("http://localhost:6101")
        );
        assert_eq!(
            config.get("experiment_url").unwrap().as_str(),
            Some("http://localhost:6101/#/experiments")
        );
    }
}
