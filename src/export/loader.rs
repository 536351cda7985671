//! Tar model loader
//!
//! Unpacks an exported archive, verifies the weight checksum, rewrites the
//! configuration's discriminators onto the archived code snapshot, and
//! reconstructs the model. Unpacking is local-rank-zero-first: one process
//! per machine extracts, the rest read the shared extraction.

use std::path::{Path, PathBuf};

use tracing::info;

use super::archive::{sha256_file, unpack};
use super::cache::ResourceCache;
use super::{
    PackagingError, CRATE_MODULE, MODEL_CONFIG_PATH, MODEL_STATE_CHECKSUM_PATH, MODEL_STATE_PATH,
    TEMP_MODULE,
};
use crate::config::ConfigValue;
use crate::dist::{local_rank_zero_first, DistBackend, RankEnv};
use crate::instantiate::{Instance, Instantiator};
use crate::runtime::model::BinaryTextClassificationModel;
use crate::weights;
use crate::{Error, Result};

/// A model reconstructed from an archive, with the configuration that
/// described it.
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub model: BinaryTextClassificationModel,
    pub config: ConfigValue,
}

/// Loads a model exported by [`super::TarModelExporter`].
#[derive(Debug, Clone)]
pub struct TarModelLoader {
    archive_path: PathBuf,
    work_dir: PathBuf,
    cache: Option<ResourceCache>,
}

impl TarModelLoader {
    pub fn new(archive_path: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            archive_path: archive_path.into(),
            work_dir: work_dir.into(),
            cache: None,
        }
    }

    /// Copy the archive through a local cache before extraction. Useful when
    /// the archive sits on shared or remote-mounted storage.
    pub fn with_cache(mut self, cache: ResourceCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Unpack (once per machine) and reconstruct the model.
    pub fn load(&self, env: &RankEnv, backend: &dyn DistBackend) -> Result<LoadedModel> {
        let extract_dir = self.work_dir.join(archive_stem(&self.archive_path));

        local_rank_zero_first(env, backend, || -> Result<()> {
            if env.is_local_zero() && !extract_dir.join(MODEL_CONFIG_PATH).exists() {
                let archive = match &self.cache {
                    Some(cache) => cache.cache_locally(&self.archive_path)?,
                    None => self.archive_path.clone(),
                };
                unpack(&archive, &extract_dir)?;
            }
            Ok(())
        })
        .map_err(Error::from)??;

        let config_path = entry(&extract_dir, MODEL_CONFIG_PATH)?;
        let state_path = entry(&extract_dir, MODEL_STATE_PATH)?;
        let checksum_path = entry(&extract_dir, MODEL_STATE_CHECKSUM_PATH)?;

        let expected = std::fs::read_to_string(checksum_path)?.trim().to_string();
        let actual = sha256_file(&state_path)?;
        if expected != actual {
            return Err(PackagingError::ChecksumMismatch { expected, actual }.into());
        }

        let mut config: ConfigValue =
            serde_yaml::from_str(&std::fs::read_to_string(config_path)?)
                .map_err(|e| PackagingError::InvalidModelConfig(e.to_string()))?;
        rewrite_targets(&mut config, CRATE_MODULE, TEMP_MODULE);

        let mut instantiator = Instantiator::with_defaults();
        instantiator.alias_prefix(TEMP_MODULE, CRATE_MODULE);
        let mut model = match instantiator.instantiate(&config)? {
            Instance::Model(model) => model,
            other => {
                return Err(PackagingError::InvalidModelConfig(format!(
                    "archive configuration built a {}, expected a model",
                    other.kind()
                ))
                .into())
            }
        };

        let state = weights::load_state(&state_path)?;
        model.load_state_dict(&state)?;
        info!(archive = %self.archive_path.display(), "model loaded");
        Ok(LoadedModel { model, config })
    }
}

/// Rewrite every `_target_` under `value` whose package prefix is `from`
/// so it names the `to` package instead. Walks maps and lists recursively.
pub fn rewrite_targets(value: &mut ConfigValue, from: &str, to: &str) {
    match value {
        ConfigValue::Map(map) => {
            if let Some(ConfigValue::Str(target)) = map.get_mut("_target_") {
                if let Some(rest) = target.strip_prefix(from) {
                    if let Some(rest) = rest.strip_prefix('.') {
                        *target = format!("{to}.{rest}");
                    }
                }
            }
            for child in map.values_mut() {
                rewrite_targets(child, from, to);
            }
        }
        ConfigValue::List(list) => {
            for child in list {
                rewrite_targets(child, from, to);
            }
        }
        _ => {}
    }
}

fn entry(extract_dir: &Path, name: &str) -> Result<PathBuf> {
    let path = extract_dir.join(name);
    if !path.exists() {
        return Err(PackagingError::MissingEntry(name.to_string()).into());
    }
    Ok(path)
}

fn archive_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model".to_string());
    name.trim_end_matches(".tar.gz").to_string()
}
