//! Tar model exporter
//!
//! Stages the model configuration, weight state, checksum, and code snapshot
//! into a temporary directory and packs it into the target archive. Only the
//! global rank zero process writes; peers block at the barrier until the
//! archive exists. The weight blob can be fetched through a local cache
//! first when it sits on shared or remote-mounted storage.

use std::path::{Path, PathBuf};

use tracing::info;

use super::archive::{pack_dir, sha256_file};
use super::cache::ResourceCache;
use super::{
    PackagingError, CRATE_MODULE, MODEL_CONFIG_PATH, MODEL_STATE_CHECKSUM_PATH, MODEL_STATE_PATH,
    TEMP_MODULE,
};
use crate::config::ConfigValue;
use crate::dist::{global_rank_zero_first, DistBackend, RankEnv};
use crate::{Error, Result};

/// Exports a trained model as one self-contained `.tar.gz`.
#[derive(Debug, Clone)]
pub struct TarModelExporter {
    archive_path: PathBuf,
    cache: Option<ResourceCache>,
}

impl TarModelExporter {
    pub fn new(archive_path: impl Into<PathBuf>) -> Self {
        Self {
            archive_path: archive_path.into(),
            cache: None,
        }
    }

    /// Pull the weight blob through a local cache before staging it.
    pub fn with_cache(mut self, cache: ResourceCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    /// Write the archive, coordinated global-rank-zero-first.
    pub fn export(
        &self,
        env: &RankEnv,
        backend: &dyn DistBackend,
        model_config: &ConfigValue,
        state_path: &Path,
    ) -> Result<()> {
        global_rank_zero_first(env, backend, || -> Result<()> {
            if !env.is_global_zero() {
                return Ok(());
            }
            self.write_archive(model_config, state_path)
        })
        .map_err(Error::from)?
    }

    fn write_archive(&self, model_config: &ConfigValue, state_path: &Path) -> Result<()> {
        let stage = tempfile::tempdir()?;

        let yaml = serde_yaml::to_string(model_config).map_err(|e| {
            Error::Packaging(PackagingError::InvalidModelConfig(e.to_string()))
        })?;
        std::fs::write(stage.path().join(MODEL_CONFIG_PATH), yaml)?;

        let state_path = match &self.cache {
            Some(cache) => cache.cache_locally(state_path)?,
            None => state_path.to_path_buf(),
        };
        std::fs::copy(&state_path, stage.path().join(MODEL_STATE_PATH))?;
        let checksum = sha256_file(&state_path)?;
        std::fs::write(stage.path().join(MODEL_STATE_CHECKSUM_PATH), &checksum)?;

        // Code snapshot: records which package and version produced the
        // archive, under the directory the rewritten discriminators name.
        let code_dir = stage.path().join(TEMP_MODULE).join("models");
        std::fs::create_dir_all(&code_dir)?;
        std::fs::write(
            code_dir.join("manifest.yaml"),
            format!(
                "package: {CRATE_MODULE}\nversion: {}\n",
                env!("CARGO_PKG_VERSION")
            ),
        )?;

        pack_dir(stage.path(), &self.archive_path)?;
        info!(archive = %self.archive_path.display(), "model exported");
        Ok(())
    }
}
