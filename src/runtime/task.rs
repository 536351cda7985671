//! Pipeline tasks
//!
//! A run executes the configured tasks in declaration order. The training
//! task fits its module, checkpoints the weight state, and exports the
//! archive; the evaluation task loads an archive and runs the test loop.

use std::path::PathBuf;

use tracing::info;

use super::data::PartialDataModule;
use super::module::{PartialEvaluationModule, TrainingModule};
use super::trainer::{FitReport, TestReport, Trainer};
use crate::config::ConfigValue;
use crate::dist::{DistBackend, RankEnv};
use crate::export::{TarModelExporter, TarModelLoader};
use crate::tracking::TrackingSink;
use crate::Result;

/// Shared run state handed to each task.
pub struct RunContext<'a> {
    pub env: RankEnv,
    pub backend: &'a dyn DistBackend,
    pub sink: &'a mut dyn TrackingSink,
    /// Scratch directory for archive extraction.
    pub work_dir: PathBuf,
}

/// Trains a module and exports the result as a tar model archive.
#[derive(Debug, Clone)]
pub struct TrainingTask {
    pub name: String,
    pub module: TrainingModule,
    pub data_module: PartialDataModule,
    pub trainer: Trainer,
    /// Raw model configuration, packaged into the archive so the loader can
    /// reconstruct the model without this process's schemas.
    pub model_config: ConfigValue,
    pub checkpoint_path: PathBuf,
    pub tar_model_export_path: PathBuf,
}

impl TrainingTask {
    pub fn run(&mut self, ctx: &mut RunContext<'_>) -> Result<FitReport> {
        info!(task = %self.name, "training task starting");
        let data = self.data_module.clone().build(self.module.transformation());
        let report = self.trainer.fit(&mut self.module, &data, ctx.sink)?;

        self.module.export_model_state_dict(&self.checkpoint_path)?;
        let exporter = TarModelExporter::new(&self.tar_model_export_path);
        exporter.export(
            &ctx.env,
            ctx.backend,
            &self.model_config,
            &self.checkpoint_path,
        )?;
        if ctx.env.is_global_zero() {
            ctx.sink.log_artifact(&self.tar_model_export_path)?;
        }
        Ok(report)
    }
}

/// Loads an exported model and evaluates it on the test split.
#[derive(Debug, Clone)]
pub struct EvaluationTask {
    pub name: String,
    pub module: PartialEvaluationModule,
    pub data_module: PartialDataModule,
    pub trainer: Trainer,
    pub tar_model_path: PathBuf,
}

impl EvaluationTask {
    pub fn run(&self, ctx: &mut RunContext<'_>) -> Result<TestReport> {
        info!(task = %self.name, "evaluation task starting");
        let loader = TarModelLoader::new(&self.tar_model_path, &ctx.work_dir);
        let loaded = loader.load(&ctx.env, ctx.backend)?;

        let data = self.data_module.clone().build(loaded.model.transformation());
        let module = self.module.build(loaded.model);
        self.trainer.test(&module, &data, ctx.sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dist::NoDist;
    use crate::runtime::model::{
        BinaryTextClassificationModel, HashingBackbone, MeanPoolAdapter, SigmoidHead,
    };
    use crate::runtime::module::BceLoss;
    use crate::runtime::optim::{OptimizerFactory, SchedulerFactory};
    use crate::tracking::InMemoryTracking;
    use std::path::Path;

    const MODEL_YAML: &str = r#"
_target_: moderar.models.binary_text_classification_model
backbone:
  _target_: moderar.models.hashing_backbone
  vocab_size: 128
  embedding_dim: 16
  max_length: 32
  seed: 3
adapter:
  _target_: moderar.models.mean_pool_adapter
head:
  _target_: moderar.models.sigmoid_head
  in_features: 16
  seed: 4
"#;

    fn write_data(dir: &Path) -> PathBuf {
        let path = dir.join("data.tsv");
        let mut content = String::from("cleaned_text\tlabel\n");
        for (text, label) in [
            ("you are a pathetic loser", "1"),
            ("nobody wants you here", "1"),
            ("hope you have a great day", "0"),
            ("thanks for helping me today", "0"),
        ] {
            content.push_str(&format!("{text}\t{label}\n"));
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    fn trainer() -> Trainer {
        Trainer {
            accelerator: "cpu".to_string(),
            max_epochs: Some(10),
            log_every_n_steps: 1,
            gradient_clip_val: Some(5.0),
            limit_train_batches: 1.0,
            limit_val_batches: 1.0,
            limit_test_batches: 1.0,
            default_root_dir: "./data".to_string(),
        }
    }

    fn data_module(path: &Path) -> PartialDataModule {
        PartialDataModule {
            train_df_path: path.to_path_buf(),
            valid_df_path: path.to_path_buf(),
            test_df_path: path.to_path_buf(),
            batch_size: 2,
            text_column_name: "cleaned_text".to_string(),
            label_column_name: "label".to_string(),
            drop_last: false,
        }
    }

    #[test]
    fn test_training_then_evaluation_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let data_path = write_data(dir.path());
        let archive = dir.path().join("exported/model.tar.gz");

        let model = BinaryTextClassificationModel::new(
            HashingBackbone::new(128, 16, 32, 3),
            MeanPoolAdapter,
            SigmoidHead::new(16, 4),
        );
        let mut training = TrainingTask {
            name: "cyberbullying_training".to_string(),
            module: TrainingModule::new(
                model,
                BceLoss,
                OptimizerFactory {
                    target: "moderar.optim.adamw".to_string(),
                    lr: 0.05,
                    betas: (0.9, 0.999),
                    eps: 1e-8,
                    weight_decay: 0.0,
                },
                SchedulerFactory {
                    target: "moderar.optim.plateau_scheduler".to_string(),
                    mode: "max".to_string(),
                    factor: 0.1,
                    patience: 3,
                    monitor: "validation_f1_score".to_string(),
                    interval: "epoch".to_string(),
                    frequency: 1,
                },
            ),
            data_module: data_module(&data_path),
            trainer: trainer(),
            model_config: serde_yaml::from_str(MODEL_YAML).unwrap(),
            checkpoint_path: dir.path().join("checkpoints/last.safetensors"),
            tar_model_export_path: archive.clone(),
        };

        let mut sink = InMemoryTracking::new();
        sink.start_run("cyberbullying", None).unwrap();
        let mut ctx = RunContext {
            env: RankEnv::standalone(),
            backend: &NoDist,
            sink: &mut sink,
            work_dir: dir.path().join("work"),
        };
        training.run(&mut ctx).unwrap();
        assert!(archive.exists());

        let evaluation = EvaluationTask {
            name: "cyberbullying_evaluation".to_string(),
            module: PartialEvaluationModule,
            data_module: data_module(&data_path),
            trainer: trainer(),
            tar_model_path: archive,
        };
        let report = evaluation.run(&mut ctx).unwrap();
        assert!((0.0..=1.0).contains(&report.accuracy));

        // Evaluation sees exactly the trained weights.
        let texts = vec!["you are a pathetic loser".to_string()];
        let loader = TarModelLoader::new(&evaluation.tar_model_path, &ctx.work_dir);
        let loaded = loader.load(&ctx.env, ctx.backend).unwrap();
        assert_eq!(
            loaded.model.forward(&texts),
            training.module.model.forward(&texts)
        );
    }
}
