//! Error types for moderar

use thiserror::Error;

use crate::config::{CompositionError, SchemaError};
use crate::dist::CoordinationError;
use crate::export::PackagingError;
use crate::instantiate::InstantiationError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Composition error: {0}")]
    Composition(#[from] CompositionError),

    #[error("Instantiation error: {0}")]
    Instantiation(#[from] InstantiationError),

    #[error("Packaging error: {0}")]
    Packaging(#[from] PackagingError),

    #[error("Coordination error: {0}")]
    Coordination(#[from] CoordinationError),

    #[error("Tracking error: {0}")]
    Tracking(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, Error>;
