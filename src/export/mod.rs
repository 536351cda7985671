//! Model packaging: export to and load from tar.gz archives
//!
//! An exported model is one self-contained `.tar.gz` holding the model
//! configuration, the weight state with its checksum, and a code snapshot
//! under the `temp_module/` directory the configuration's discriminators are
//! rewritten to point at. Export runs global-rank-zero-first so one process
//! per job writes the archive; loading runs local-rank-zero-first so one
//! process per machine unpacks it.

mod archive;
mod cache;
mod exporter;
mod loader;

use thiserror::Error;

pub use archive::{pack_dir, sha256_file, unpack};
pub use cache::ResourceCache;
pub use exporter::TarModelExporter;
pub use loader::TarModelLoader;

/// Archive entry holding the model configuration.
pub const MODEL_CONFIG_PATH: &str = "model_config.yaml";

/// Archive entry holding the weight state.
pub const MODEL_STATE_PATH: &str = "model_state.safetensors";

/// Archive entry holding the hex SHA-256 of the weight state.
pub const MODEL_STATE_CHECKSUM_PATH: &str = "model_state.sha256";

/// Directory inside the archive the code snapshot lands in, and the package
/// prefix `_target_` discriminators are rewritten to when the archive loads.
pub const TEMP_MODULE: &str = "temp_module";

/// The package prefix discriminators carry before rewriting.
pub const CRATE_MODULE: &str = "moderar";

#[derive(Debug, Error)]
pub enum PackagingError {
    #[error("Archive entry missing: '{0}'")]
    MissingEntry(String),

    #[error("Weight checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Invalid model configuration in archive: {0}")]
    InvalidModelConfig(String),
}
