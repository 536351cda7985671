//! Schema registry
//!
//! An explicit registry object passed to composition calls. Registration is
//! idempotent: storing the identical node twice is a no-op, because schema
//! modules may be registered from several call sites. Storing a different
//! node under an existing name fails fast at registration time, never at
//! composition time.

use std::collections::BTreeMap;

use thiserror::Error;

use super::schema::SchemaNode;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Conflicting registration for schema '{0}'")]
    ConflictingRegistration(String),

    #[error("Unknown schema: '{0}'")]
    UnknownSchema(String),

    #[error("Inheritance cycle through schema '{0}'")]
    InheritanceCycle(String),
}

#[derive(Debug, Default, Clone)]
pub struct SchemaRegistry {
    nodes: BTreeMap<String, SchemaNode>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema node under its name.
    pub fn register(&mut self, node: SchemaNode) -> Result<(), SchemaError> {
        match self.nodes.get(&node.name) {
            Some(existing) if *existing == node => Ok(()),
            Some(_) => Err(SchemaError::ConflictingRegistration(node.name.clone())),
            None => {
                self.nodes.insert(node.name.clone(), node);
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Result<&SchemaNode, SchemaError> {
        self.nodes
            .get(name)
            .ok_or_else(|| SchemaError::UnknownSchema(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Inheritance chain for a schema, root ancestor first.
    pub fn chain(&self, name: &str) -> Result<Vec<&SchemaNode>, SchemaError> {
        let mut chain = Vec::new();
        let mut seen = Vec::new();
        let mut current = Some(name.to_string());
        while let Some(n) = current {
            if seen.contains(&n) {
                return Err(SchemaError::InheritanceCycle(n));
            }
            let node = self.get(&n)?;
            seen.push(n);
            current = node.parent.clone();
            chain.push(node);
        }
        chain.reverse();
        Ok(chain)
    }
}
