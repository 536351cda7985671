//! Trainer: fit and test loops
//!
//! A deliberately small stand-in for an external training framework: epoch
//! loop, gradient clipping, validation at epoch end, plateau scheduling, and
//! metric logging to the tracking sink.

use tracing::info;

use super::data::TextClassificationDataModule;
use super::module::{EvaluationModule, TrainingModule};
use crate::tracking::TrackingSink;
use crate::Result;

/// Trainer configuration and loops.
#[derive(Debug, Clone, PartialEq)]
pub struct Trainer {
    pub accelerator: String,
    pub max_epochs: Option<usize>,
    pub log_every_n_steps: usize,
    pub gradient_clip_val: Option<f64>,
    pub limit_train_batches: f64,
    pub limit_val_batches: f64,
    pub limit_test_batches: f64,
    pub default_root_dir: String,
}

/// Summary of a completed fit.
#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    pub epochs_run: usize,
    pub final_train_loss: f32,
    pub final_validation_f1: f64,
}

/// Summary of a test pass.
#[derive(Debug, Clone, PartialEq)]
pub struct TestReport {
    pub loss: f32,
    pub accuracy: f64,
    pub f1_score: f64,
}

impl Trainer {
    pub fn fit(
        &self,
        module: &mut TrainingModule,
        data: &TextClassificationDataModule,
        sink: &mut dyn TrackingSink,
    ) -> Result<FitReport> {
        let max_epochs = self.max_epochs.unwrap_or(1);
        let mut optimizer = module.optimizer.build(module.head_params().len());
        let mut scheduler = module.scheduler.build(optimizer.lr);

        let train_batches = limit(data.train_batches()?, self.limit_train_batches);
        let valid_batches = limit(data.valid_batches()?, self.limit_val_batches);

        let mut step: u64 = 0;
        let mut last_loss = 0.0f32;
        let mut last_f1 = 0.0f64;
        for epoch in 0..max_epochs {
            for batch in &train_batches {
                let (loss, mut grad) = module.training_step(&batch.texts, &batch.labels);
                if let Some(clip) = self.gradient_clip_val {
                    let clip = clip as f32;
                    for g in &mut grad {
                        *g = g.clamp(-clip, clip);
                    }
                }
                let mut params = module.head_params();
                optimizer.step(&mut params, &grad);
                module.set_head_params(&params);

                last_loss = loss;
                if step % self.log_every_n_steps.max(1) as u64 == 0 {
                    sink.log_metric("train_loss", step, f64::from(loss))?;
                }
                step += 1;
            }

            let mut correct = 0usize;
            let mut total = 0usize;
            let mut tp = 0usize;
            let mut fp = 0usize;
            let mut fn_ = 0usize;
            for batch in &valid_batches {
                let probs = module.model.forward(&batch.texts);
                tally(
                    &probs, &batch.labels, &mut correct, &mut total, &mut tp, &mut fp, &mut fn_,
                );
            }
            last_f1 = f1(tp, fp, fn_);
            sink.log_metric("validation_f1_score", epoch as u64, last_f1)?;
            optimizer.lr = scheduler.step(last_f1);

            info!(epoch, loss = last_loss, f1 = last_f1, "epoch finished");
        }

        Ok(FitReport {
            epochs_run: max_epochs,
            final_train_loss: last_loss,
            final_validation_f1: last_f1,
        })
    }

    pub fn test(
        &self,
        module: &EvaluationModule,
        data: &TextClassificationDataModule,
        sink: &mut dyn TrackingSink,
    ) -> Result<TestReport> {
        let batches = limit(data.test_batches()?, self.limit_test_batches);
        let loss_fn = super::module::BceLoss;

        let mut correct = 0usize;
        let mut total = 0usize;
        let mut tp = 0usize;
        let mut fp = 0usize;
        let mut fn_ = 0usize;
        let mut loss_sum = 0.0f32;
        for batch in &batches {
            let probs = module.model.forward(&batch.texts);
            loss_sum += loss_fn.compute(&probs, &batch.labels);
            tally(
                &probs, &batch.labels, &mut correct, &mut total, &mut tp, &mut fp, &mut fn_,
            );
        }

        let report = TestReport {
            loss: loss_sum / batches.len().max(1) as f32,
            accuracy: correct as f64 / total.max(1) as f64,
            f1_score: f1(tp, fp, fn_),
        };
        sink.log_metric("test_loss", 0, f64::from(report.loss))?;
        sink.log_metric("test_accuracy", 0, report.accuracy)?;
        sink.log_metric("test_f1_score", 0, report.f1_score)?;
        info!(
            accuracy = report.accuracy,
            f1 = report.f1_score,
            "test finished"
        );
        Ok(report)
    }
}

fn limit<T>(batches: Vec<T>, fraction: f64) -> Vec<T> {
    if fraction >= 1.0 {
        return batches;
    }
    let keep = ((batches.len() as f64 * fraction).ceil() as usize).max(1);
    batches.into_iter().take(keep).collect()
}

#[allow(clippy::too_many_arguments)]
fn tally(
    probs: &ndarray::Array1<f32>,
    labels: &[f32],
    correct: &mut usize,
    total: &mut usize,
    tp: &mut usize,
    fp: &mut usize,
    fn_: &mut usize,
) {
    for (p, y) in probs.iter().zip(labels) {
        let predicted = *p > 0.5;
        let actual = *y > 0.5;
        *total += 1;
        if predicted == actual {
            *correct += 1;
        }
        match (predicted, actual) {
            (true, true) => *tp += 1,
            (true, false) => *fp += 1,
            (false, true) => *fn_ += 1,
            (false, false) => {}
        }
    }
}

fn f1(tp: usize, fp: usize, fn_: usize) -> f64 {
    let denom = 2 * tp + fp + fn_;
    if denom == 0 {
        return 0.0;
    }
    2.0 * tp as f64 / denom as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::data::PartialDataModule;
    use crate::runtime::model::{
        BinaryTextClassificationModel, HashingBackbone, MeanPoolAdapter, SigmoidHead,
    };
    use crate::runtime::module::{BceLoss, PartialEvaluationModule};
    use crate::runtime::optim::{OptimizerFactory, SchedulerFactory};
    use crate::tracking::InMemoryTracking;
    use std::path::Path;

    fn trainer(max_epochs: usize) -> Trainer {
        Trainer {
            accelerator: "cpu".to_string(),
            max_epochs: Some(max_epochs),
            log_every_n_steps: 1,
            gradient_clip_val: Some(5.0),
            limit_train_batches: 1.0,
            limit_val_batches: 1.0,
            limit_test_batches: 1.0,
            default_root_dir: "./data".to_string(),
        }
    }

    fn write_data(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("data.tsv");
        let mut content = String::from("cleaned_text\tlabel\n");
        let rows = [
            ("you are a pathetic loser", "1"),
            ("nobody wants you here loser", "1"),
            ("what a stupid worthless idiot", "1"),
            ("shut up you pathetic idiot", "1"),
            ("hope you have a great day", "0"),
            ("thanks for helping me today", "0"),
            ("that was a lovely dinner", "0"),
            ("see you at practice tomorrow", "0"),
        ];
        for (text, label) in rows {
            content.push_str(&format!("{text}\t{label}\n"));
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    fn fixture(dir: &Path) -> (TrainingModule, crate::runtime::data::TextClassificationDataModule) {
        let backbone = HashingBackbone::new(128, 16, 32, 3);
        let head = SigmoidHead::new(16, 4);
        let module = TrainingModule::new(
            BinaryTextClassificationModel::new(backbone, MeanPoolAdapter, head),
            BceLoss,
            OptimizerFactory {
                target: "torch.optim.adam".to_string(),
                lr: 0.05,
                betas: (0.9, 0.999),
                eps: 1e-8,
                weight_decay: 0.0,
            },
            SchedulerFactory {
                target: "plateau".to_string(),
                mode: "max".to_string(),
                factor: 0.1,
                patience: 3,
                monitor: "validation_f1_score".to_string(),
                interval: "epoch".to_string(),
                frequency: 1,
            },
        );
        let data_path = write_data(dir);
        let data = PartialDataModule {
            train_df_path: data_path.clone(),
            valid_df_path: data_path.clone(),
            test_df_path: data_path,
            batch_size: 4,
            text_column_name: "cleaned_text".to_string(),
            label_column_name: "label".to_string(),
            drop_last: false,
        }
        .build(module.transformation());
        (module, data)
    }

    #[test]
    fn test_fit_logs_metrics_and_learns() {
        let dir = tempfile::tempdir().unwrap();
        let (mut module, data) = fixture(dir.path());
        let mut sink = InMemoryTracking::new();
        sink.start_run("test", None).unwrap();

        let before = {
            let probs = module.model.forward(&["you pathetic loser".to_string()]);
            probs[0]
        };
        let report = trainer(30).fit(&mut module, &data, &mut sink).unwrap();
        let after = {
            let probs = module.model.forward(&["you pathetic loser".to_string()]);
            probs[0]
        };

        assert_eq!(report.epochs_run, 30);
        assert!(after > before, "bullying probability should increase");
        let run = sink.runs.values().next().unwrap();
        assert!(run.metrics.contains_key("train_loss"));
        assert_eq!(run.metrics["validation_f1_score"].len(), 30);
    }

    #[test]
    fn test_fit_with_zero_log_cadence_logs_every_step() {
        let dir = tempfile::tempdir().unwrap();
        let (mut module, data) = fixture(dir.path());
        let mut sink = InMemoryTracking::new();
        sink.start_run("test", None).unwrap();

        let mut config = trainer(2);
        config.log_every_n_steps = 0;
        config.fit(&mut module, &data, &mut sink).unwrap();

        let run = sink.runs.values().next().unwrap();
        assert!(run.metrics.contains_key("train_loss"));
    }

    #[test]
    fn test_test_reports_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let (mut module, data) = fixture(dir.path());
        let mut sink = InMemoryTracking::new();
        sink.start_run("test", None).unwrap();
        trainer(30).fit(&mut module, &data, &mut sink).unwrap();

        let eval = PartialEvaluationModule.build(module.model.clone());
        let report = trainer(1).test(&eval, &data, &mut sink).unwrap();
        assert!(report.accuracy > 0.5);
        assert!((0.0..=1.0).contains(&report.f1_score));
        let run = sink.runs.values().next().unwrap();
        assert!(run.metrics.contains_key("test_accuracy"));
    }

    #[test]
    fn test_limit_batches() {
        let batches = vec![1, 2, 3, 4];
        assert_eq!(limit(batches.clone(), 1.0).len(), 4);
        assert_eq!(limit(batches.clone(), 0.5).len(), 2);
        assert_eq!(limit(batches, 0.01).len(), 1);
    }
}
