//! Runtime objects the instantiator constructs: model components, data
//! modules, optimizer and scheduler factories, training and evaluation
//! modules, the trainer, and the pipeline tasks.

pub mod data;
pub mod model;
pub mod module;
pub mod optim;
pub mod task;
pub mod trainer;

pub use data::{Batch, PartialDataModule, TextClassificationDataModule};
pub use model::{
    BinaryTextClassificationModel, HashingBackbone, MeanPoolAdapter, SigmoidHead, Transformation,
};
pub use module::{BceLoss, EvaluationModule, PartialEvaluationModule, TrainingModule};
pub use optim::{Optimizer, OptimizerFactory, PlateauScheduler, SchedulerFactory};
pub use task::{EvaluationTask, RunContext, TrainingTask};
pub use trainer::{FitReport, TestReport, Trainer};
