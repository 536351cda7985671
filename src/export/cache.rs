//! Local caching of remote or shared artifacts
//!
//! Archives often live on shared storage. The cache copies them once into a
//! local directory keyed by content checksum, so repeated loads on one
//! machine skip the transfer.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::archive::sha256_file;
use crate::{Error, Result};

/// A content-addressed local file cache.
#[derive(Debug, Clone)]
pub struct ResourceCache {
    root: PathBuf,
}

impl ResourceCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Copy `source` into the cache if it is not already there; returns the
    /// local path. Idempotent for unchanged content.
    pub fn cache_locally(&self, source: &Path) -> Result<PathBuf> {
        let file_name = source
            .file_name()
            .ok_or_else(|| Error::Serialization(format!("{}: not a file", source.display())))?;
        let checksum = sha256_file(source)?;
        let slot = self.root.join(&checksum[..16]);
        let local = slot.join(file_name);
        if !local.exists() {
            debug!(source = %source.display(), local = %local.display(), "caching resource");
            std::fs::create_dir_all(&slot)?;
            std::fs::copy(source, &local)?;
        }
        Ok(local)
    }
}
