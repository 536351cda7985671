//! moderar: configuration-driven training and evaluation for binary text
//! classification.
//!
//! The pipeline is configuration first: declarative schema nodes are
//! registered into a [`config::SchemaRegistry`], composed with overrides and
//! interpolated references into one concrete tree, and instantiated into the
//! runtime object graph through an explicit factory table. Trained models
//! are packaged as self-contained tar archives that a separate evaluation
//! process can load without the training schemas.
//!
//! # Example
//!
//! ```no_run
//! use moderar::config::compose;
//! use moderar::instantiate::Instantiator;
//! use moderar::schemas;
//!
//! # fn main() -> moderar::Result<()> {
//! let registry = schemas::default_registry()?;
//! let config = compose(&registry, "local_tiny", &[])?;
//! let _instance = Instantiator::with_defaults().instantiate(config.tree())?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod dist;
mod error;
pub mod export;
pub mod instantiate;
pub mod runtime;
pub mod schemas;
pub mod tracking;
pub mod weights;

pub use error::{Error, Result};
