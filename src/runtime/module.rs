//! Training and evaluation modules
//!
//! A training module bundles the model with its loss and the deferred
//! optimizer/scheduler factories; the trainer drives it. The evaluation
//! module is built partially: the model arrives later, loaded from an
//! exported archive.

use ndarray::Array1;

use super::model::{BinaryTextClassificationModel, Transformation};
use super::optim::{OptimizerFactory, SchedulerFactory};
use crate::weights;
use crate::Result;
use std::path::Path;

/// Binary cross-entropy loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BceLoss;

impl BceLoss {
    pub fn compute(&self, probs: &Array1<f32>, labels: &[f32]) -> f32 {
        let eps = 1e-7f32;
        let n = probs.len().max(1) as f32;
        probs
            .iter()
            .zip(labels)
            .map(|(p, y)| {
                let p = p.clamp(eps, 1.0 - eps);
                -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
            })
            .sum::<f32>()
            / n
    }
}

/// Model + loss + deferred optimizer/scheduler, driven by the trainer.
#[derive(Debug, Clone)]
pub struct TrainingModule {
    pub model: BinaryTextClassificationModel,
    pub loss: BceLoss,
    pub optimizer: OptimizerFactory,
    pub scheduler: SchedulerFactory,
}

impl TrainingModule {
    pub fn new(
        model: BinaryTextClassificationModel,
        loss: BceLoss,
        optimizer: OptimizerFactory,
        scheduler: SchedulerFactory,
    ) -> Self {
        Self {
            model,
            loss,
            optimizer,
            scheduler,
        }
    }

    pub fn transformation(&self) -> Transformation {
        self.model.transformation()
    }

    /// Head parameters as one flat vector: weights then bias.
    pub fn head_params(&self) -> Vec<f32> {
        let mut params = self.model.head.weight.to_vec();
        params.push(self.model.head.bias);
        params
    }

    pub fn set_head_params(&mut self, params: &[f32]) {
        let dim = self.model.head.weight.len();
        self.model.head.weight = Array1::from_vec(params[..dim].to_vec());
        self.model.head.bias = params[dim];
    }

    /// Loss and flat head gradient for one batch. The backbone embedding is
    /// frozen; only the head trains.
    pub fn training_step(&self, texts: &[String], labels: &[f32]) -> (f32, Vec<f32>) {
        let dim = self.model.head.weight.len();
        let mut grad = vec![0.0f32; dim + 1];
        let probs = self.model.forward(texts);
        let n = texts.len().max(1) as f32;
        for ((text, p), y) in texts.iter().zip(probs.iter()).zip(labels) {
            let features = self.model.features(text);
            let residual = p - y;
            for (g, x) in grad[..dim].iter_mut().zip(features.iter()) {
                *g += residual * x / n;
            }
            grad[dim] += residual / n;
        }
        (self.loss.compute(&probs, labels), grad)
    }

    /// Persist the model's weight state for export; returns the written path.
    pub fn export_model_state_dict(&self, checkpoint_path: &Path) -> Result<()> {
        if let Some(parent) = checkpoint_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        weights::save_state(&self.model.state_dict(), checkpoint_path)
    }
}

/// Evaluation module configuration awaiting the model from an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartialEvaluationModule;

impl PartialEvaluationModule {
    pub fn build(self, model: BinaryTextClassificationModel) -> EvaluationModule {
        EvaluationModule { model }
    }
}

/// A loaded model wrapped for the test loop.
#[derive(Debug, Clone)]
pub struct EvaluationModule {
    pub model: BinaryTextClassificationModel,
}
