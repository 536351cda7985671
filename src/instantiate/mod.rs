//! Object instantiation from resolved configuration trees
//!
//! A map node carrying a `_target_` discriminator is constructed through the
//! factory registered for that discriminator. Construction is post-order:
//! children are instantiated first and handed to the parent's factory as
//! named arguments. Nodes marked `_partial_` resolve to deferred builders
//! that the owning object completes once the late arguments exist. Deferral
//! is a property of the registered target: factories for optimizers,
//! schedulers, data modules, and evaluation modules return partial builders
//! whether or not the marker is present, so `_partial_` is configuration
//! metadata rather than an input to construction.

mod targets;

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigValue;
use crate::runtime::data::PartialDataModule;
use crate::runtime::model::{
    BinaryTextClassificationModel, HashingBackbone, MeanPoolAdapter, SigmoidHead,
};
use crate::runtime::module::{BceLoss, PartialEvaluationModule, TrainingModule};
use crate::runtime::optim::{OptimizerFactory, SchedulerFactory};
use crate::runtime::task::{EvaluationTask, TrainingTask};
use crate::runtime::trainer::Trainer;

#[derive(Debug, Error)]
pub enum InstantiationError {
    #[error("Unknown _target_ '{target}' at '{at}'")]
    UnknownTarget { target: String, at: String },

    #[error("Construction failed at '{at}': {detail}")]
    Construction { at: String, detail: String },
}

/// Everything the factory table can construct.
#[derive(Debug, Clone)]
pub enum Instance {
    /// A plain configuration subtree with no `_target_` anywhere inside.
    Value(ConfigValue),
    /// A map whose children include constructed objects.
    Group(BTreeMap<String, Instance>),
    /// A list whose elements include constructed objects.
    Seq(Vec<Instance>),
    Backbone(HashingBackbone),
    Adapter(MeanPoolAdapter),
    Head(SigmoidHead),
    Model(BinaryTextClassificationModel),
    Loss(BceLoss),
    Optimizer(OptimizerFactory),
    Scheduler(SchedulerFactory),
    DataModule(PartialDataModule),
    TrainingModule(TrainingModule),
    EvaluationModule(PartialEvaluationModule),
    Trainer(Trainer),
    TrainingTask(Box<TrainingTask>),
    EvaluationTask(Box<EvaluationTask>),
}

impl Instance {
    /// Human-readable variant name for construction errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Instance::Value(_) => "value",
            Instance::Group(_) => "group",
            Instance::Seq(_) => "sequence",
            Instance::Backbone(_) => "backbone",
            Instance::Adapter(_) => "adapter",
            Instance::Head(_) => "head",
            Instance::Model(_) => "model",
            Instance::Loss(_) => "loss",
            Instance::Optimizer(_) => "optimizer",
            Instance::Scheduler(_) => "scheduler",
            Instance::DataModule(_) => "data module",
            Instance::TrainingModule(_) => "training module",
            Instance::EvaluationModule(_) => "evaluation module",
            Instance::Trainer(_) => "trainer",
            Instance::TrainingTask(_) => "training task",
            Instance::EvaluationTask(_) => "evaluation task",
        }
    }
}

/// Named, already-instantiated arguments handed to a factory, together with
/// the raw configuration each argument was built from.
pub struct Fields {
    at: String,
    target: String,
    entries: BTreeMap<String, (Instance, ConfigValue)>,
}

impl Fields {
    /// Dotted path of the node under construction.
    pub fn at(&self) -> &str {
        &self.at
    }

    /// The discriminator that selected this factory.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn err(&self, detail: impl Into<String>) -> InstantiationError {
        InstantiationError::Construction {
            at: self.at.clone(),
            detail: detail.into(),
        }
    }

    /// Consume one named argument.
    pub fn take(&mut self, name: &str) -> Result<Instance, InstantiationError> {
        self.entries
            .remove(name)
            .map(|(instance, _)| instance)
            .ok_or_else(|| self.err(format!("missing argument '{name}'")))
    }

    /// The raw configuration subtree an argument was instantiated from.
    pub fn raw(&self, name: &str) -> Result<&ConfigValue, InstantiationError> {
        self.entries
            .get(name)
            .map(|(_, raw)| raw)
            .ok_or_else(|| self.err(format!("missing argument '{name}'")))
    }

    /// Consume a plain-value argument.
    pub fn value(&mut self, name: &str) -> Result<ConfigValue, InstantiationError> {
        match self.take(name)? {
            Instance::Value(v) => Ok(v),
            other => Err(self.err(format!(
                "argument '{name}' is a {}, expected a plain value",
                other.kind()
            ))),
        }
    }

    pub fn str(&mut self, name: &str) -> Result<String, InstantiationError> {
        let value = self.value(name)?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.err(format!("argument '{name}' is not a string: {value}")))
    }

    pub fn path(&mut self, name: &str) -> Result<PathBuf, InstantiationError> {
        self.str(name).map(PathBuf::from)
    }

    pub fn bool(&mut self, name: &str) -> Result<bool, InstantiationError> {
        let value = self.value(name)?;
        value
            .as_bool()
            .ok_or_else(|| self.err(format!("argument '{name}' is not a boolean: {value}")))
    }

    pub fn usize(&mut self, name: &str) -> Result<usize, InstantiationError> {
        let value = self.value(name)?;
        value
            .as_i64()
            .and_then(|i| usize::try_from(i).ok())
            .ok_or_else(|| {
                self.err(format!("argument '{name}' is not a non-negative integer: {value}"))
            })
    }

    pub fn u64(&mut self, name: &str) -> Result<u64, InstantiationError> {
        let value = self.value(name)?;
        value
            .as_i64()
            .and_then(|i| u64::try_from(i).ok())
            .ok_or_else(|| {
                self.err(format!("argument '{name}' is not a non-negative integer: {value}"))
            })
    }

    pub fn f64(&mut self, name: &str) -> Result<f64, InstantiationError> {
        let value = self.value(name)?;
        value
            .as_f64()
            .ok_or_else(|| self.err(format!("argument '{name}' is not a number: {value}")))
    }

    /// A nullable integer argument: `null` means absent.
    pub fn opt_usize(&mut self, name: &str) -> Result<Option<usize>, InstantiationError> {
        let value = self.value(name)?;
        if value.is_null() {
            return Ok(None);
        }
        value
            .as_i64()
            .and_then(|i| usize::try_from(i).ok())
            .map(Some)
            .ok_or_else(|| {
                self.err(format!("argument '{name}' is not a non-negative integer: {value}"))
            })
    }

    /// A nullable number argument: `null` means absent.
    pub fn opt_f64(&mut self, name: &str) -> Result<Option<f64>, InstantiationError> {
        let value = self.value(name)?;
        if value.is_null() {
            return Ok(None);
        }
        value
            .as_f64()
            .map(Some)
            .ok_or_else(|| self.err(format!("argument '{name}' is not a number: {value}")))
    }
}

/// A constructor for one discriminator.
pub type Factory = fn(&mut Fields) -> Result<Instance, InstantiationError>;

/// The discriminator-to-factory table.
pub struct Instantiator {
    factories: BTreeMap<String, Factory>,
    aliases: Vec<(String, String)>,
}

impl Default for Instantiator {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Instantiator {
    /// An empty table. Mostly useful in tests.
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
            aliases: Vec::new(),
        }
    }

    /// The table with every built-in target registered.
    pub fn with_defaults() -> Self {
        let mut instantiator = Self::new();
        targets::register_builtins(&mut instantiator);
        instantiator
    }

    pub fn register(&mut self, target: impl Into<String>, factory: Factory) {
        self.factories.insert(target.into(), factory);
    }

    /// Make discriminators under `from.` resolve as if written under `to.`.
    /// The archive loader registers `temp_module -> moderar` so configurations
    /// rewritten for packaging still construct.
    pub fn alias_prefix(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.aliases.push((from.into(), to.into()));
    }

    fn canonical(&self, target: &str) -> String {
        for (from, to) in &self.aliases {
            if let Some(rest) = target.strip_prefix(from.as_str()) {
                if let Some(rest) = rest.strip_prefix('.') {
                    return format!("{to}.{rest}");
                }
            }
        }
        target.to_string()
    }

    /// Instantiate a whole resolved configuration tree.
    pub fn instantiate(&self, tree: &ConfigValue) -> Result<Instance, InstantiationError> {
        self.instantiate_at(tree, "")
    }

    /// Instantiate the subtree rooted at `at` (used in error messages).
    pub fn instantiate_at(
        &self,
        value: &ConfigValue,
        at: &str,
    ) -> Result<Instance, InstantiationError> {
        match value {
            ConfigValue::Map(map) if map.contains_key("_target_") => {
                let target = map
                    .get("_target_")
                    .and_then(ConfigValue::as_str)
                    .ok_or_else(|| InstantiationError::Construction {
                        at: at.to_string(),
                        detail: "_target_ is not a string".to_string(),
                    })?;

                let mut entries = BTreeMap::new();
                for (key, child) in map {
                    if key == "_target_" || key == "_partial_" {
                        continue;
                    }
                    let child_at = join(at, key);
                    let instance = self.instantiate_at(child, &child_at)?;
                    entries.insert(key.clone(), (instance, child.clone()));
                }

                let factory = self.factories.get(&self.canonical(target)).ok_or_else(|| {
                    InstantiationError::UnknownTarget {
                        target: target.to_string(),
                        at: at.to_string(),
                    }
                })?;

                let mut fields = Fields {
                    at: at.to_string(),
                    target: target.to_string(),
                    entries,
                };
                let instance = factory(&mut fields)?;

                if let Some(leftover) = fields.entries.keys().next() {
                    return Err(InstantiationError::Construction {
                        at: at.to_string(),
                        detail: format!("unexpected argument '{leftover}' for '{target}'"),
                    });
                }
                Ok(instance)
            }
            ConfigValue::Map(map) => {
                let mut children = BTreeMap::new();
                let mut all_plain = true;
                for (key, child) in map {
                    let instance = self.instantiate_at(child, &join(at, key))?;
                    all_plain &= matches!(instance, Instance::Value(_));
                    children.insert(key.clone(), instance);
                }
                if all_plain {
                    Ok(Instance::Value(value.clone()))
                } else {
                    Ok(Instance::Group(children))
                }
            }
            ConfigValue::List(list) => {
                let mut children = Vec::with_capacity(list.len());
                let mut all_plain = true;
                for (index, child) in list.iter().enumerate() {
                    let instance = self.instantiate_at(child, &join(at, &index.to_string()))?;
                    all_plain &= matches!(instance, Instance::Value(_));
                    children.push(instance);
                }
                if all_plain {
                    Ok(Instance::Value(value.clone()))
                } else {
                    Ok(Instance::Seq(children))
                }
            }
            scalar => Ok(Instance::Value(scalar.clone())),
        }
    }
}

fn join(at: &str, key: &str) -> String {
    if at.is_empty() {
        key.to_string()
    } else {
        format!("{at}.{key}")
    }
}
