//! Hierarchical configuration: schema registry, composition, interpolation
//!
//! The configuration layer is the front door of the pipeline: declarative
//! schema nodes (see `crate::schemas`) are registered into a `SchemaRegistry`,
//! composed with experiment overrides into a `ResolvedConfig`, and handed to
//! the instantiator exactly once.

mod compose;
mod interpolate;
mod registry;
mod schema;
mod value;


pub use compose::{compose, CompositionError, ResolvedConfig};
pub use registry::{SchemaError, SchemaRegistry};
pub use schema::{FieldDef, NodeRef, SchemaNode};
pub use value::{ConfigValue, MISSING};
