//! Command-line interface
//!
//! `compose` prints or saves a resolved configuration, `validate` composes
//! and verifies without running, and `run` executes the experiment's tasks.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use crate::config::{compose, ConfigValue, ResolvedConfig, SchemaRegistry};
use crate::dist::{NoDist, RankEnv};
use crate::instantiate::{Instance, Instantiator};
use crate::runtime::RunContext;
use crate::schemas;
use crate::tracking::{InMemoryTracking, RunStatus, TrackingSink};
use crate::{Error, Result};

#[derive(Parser, Debug)]
#[command(name = "moderar", version, about = "Configuration-driven training pipeline")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compose an experiment configuration and print it as YAML
    Compose {
        /// Registered experiment schema name
        experiment: String,

        /// Dotted-path overrides, `path=value`, applied in order
        #[arg(short = 'o', long = "override", value_name = "PATH=VALUE")]
        overrides: Vec<String>,

        /// Write the resolved YAML here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Compose and verify an experiment configuration without running it
    Validate {
        experiment: String,

        #[arg(short = 'o', long = "override", value_name = "PATH=VALUE")]
        overrides: Vec<String>,
    },

    /// Compose an experiment and run its tasks in order
    Run {
        experiment: String,

        #[arg(short = 'o', long = "override", value_name = "PATH=VALUE")]
        overrides: Vec<String>,
    },
}

/// Parse a `path=value` override. The value side is YAML, so `10` is an
/// integer, `null` is null, and bare words are strings.
pub fn parse_override(spec: &str) -> Result<(String, ConfigValue)> {
    let (path, raw) = spec
        .split_once('=')
        .ok_or_else(|| Error::Serialization(format!("override '{spec}' is not 'path=value'")))?;
    let value = serde_yaml::from_str(raw).unwrap_or_else(|_| ConfigValue::Str(raw.to_string()));
    Ok((path.to_string(), value))
}

fn parse_overrides(specs: &[String]) -> Result<Vec<(String, ConfigValue)>> {
    specs.iter().map(|s| parse_override(s)).collect()
}

pub fn execute(cli: Cli) -> Result<()> {
    let mut registry = SchemaRegistry::new();
    schemas::register_defaults(&mut registry)?;

    match cli.command {
        Command::Compose {
            experiment,
            overrides,
            output,
        } => {
            let config = compose_experiment(&registry, &experiment, &overrides)?;
            match output {
                Some(path) => config.save(&path)?,
                None => println!("{}", config.to_yaml()?),
            }
            Ok(())
        }
        Command::Validate {
            experiment,
            overrides,
        } => {
            let config = compose_experiment(&registry, &experiment, &overrides)?;
            // Instantiation catches what composition cannot: unknown
            // discriminators and bad constructor arguments.
            Instantiator::with_defaults().instantiate(config.tree())?;
            info!(%experiment, "configuration is valid");
            Ok(())
        }
        Command::Run {
            experiment,
            overrides,
        } => {
            let config = compose_experiment(&registry, &experiment, &overrides)?;
            run_experiment(&experiment, &config)
        }
    }
}

fn compose_experiment(
    registry: &SchemaRegistry,
    experiment: &str,
    overrides: &[String],
) -> Result<ResolvedConfig> {
    let overrides = parse_overrides(overrides)?;
    Ok(compose(registry, experiment, &overrides)?)
}

/// Instantiate every task in the resolved configuration and run them:
/// training tasks first, then evaluation tasks, each group in name order.
pub fn run_experiment(experiment: &str, config: &ResolvedConfig) -> Result<()> {
    let experiment_name = config
        .get("infrastructure.experiment_name")
        .and_then(ConfigValue::as_str)
        .unwrap_or(experiment)
        .to_string();
    let work_dir = config
        .get("work_dir")
        .and_then(ConfigValue::as_str)
        .unwrap_or("./data/work")
        .to_string();

    let instance = Instantiator::with_defaults().instantiate(config.tree())?;
    let mut children = match instance {
        Instance::Group(children) => children,
        other => {
            return Err(Error::Serialization(format!(
                "experiment '{experiment}' resolved to a {}, expected a task group",
                other.kind()
            )))
        }
    };
    let tasks = match children.remove("tasks") {
        Some(Instance::Group(tasks)) => tasks,
        _ => {
            return Err(Error::Serialization(format!(
                "experiment '{experiment}' has no runnable tasks"
            )))
        }
    };

    let mut training = Vec::new();
    let mut evaluation = Vec::new();
    for (name, task) in tasks {
        match task {
            Instance::TrainingTask(task) => training.push(*task),
            Instance::EvaluationTask(task) => evaluation.push(*task),
            other => {
                return Err(Error::Serialization(format!(
                    "task '{name}' resolved to a {}, expected a task",
                    other.kind()
                )))
            }
        }
    }

    let work_dir = PathBuf::from(work_dir);
    std::fs::create_dir_all(&work_dir)?;

    let run_name = config
        .get("infrastructure.run_name")
        .and_then(ConfigValue::as_str);
    let mut sink = InMemoryTracking::new();
    let run_id = sink.start_run(&experiment_name, run_name)?;
    sink.log_param("experiment", experiment)?;
    if let Some(seed) = config.get("seed").and_then(ConfigValue::as_i64) {
        sink.log_param("seed", &seed.to_string())?;
    }
    // Attach the fully resolved configuration to the run.
    let final_config = work_dir.join("final_config.yaml");
    config.save(&final_config)?;
    sink.log_artifact(&final_config)?;
    info!(%run_id, experiment, "run started");

    let mut ctx = RunContext {
        env: RankEnv::from_env(),
        backend: &NoDist,
        sink: &mut sink,
        work_dir: work_dir.clone(),
    };

    let outcome = (|| -> Result<()> {
        for mut task in training {
            let report = task.run(&mut ctx)?;
            info!(
                task = %task.name,
                epochs = report.epochs_run,
                f1 = report.final_validation_f1,
                "training task finished"
            );
        }
        for task in evaluation {
            let report = task.run(&mut ctx)?;
            info!(
                task = %task.name,
                accuracy = report.accuracy,
                f1 = report.f1_score,
                "evaluation task finished"
            );
        }
        Ok(())
    })();

    match &outcome {
        Ok(()) => sink.end_run(RunStatus::Success)?,
        Err(err) => {
            error!(%err, "run failed");
            sink.end_run(RunStatus::Failed)?;
        }
    }

    if let Some(record) = sink.runs.get(&run_id) {
        let summary = serde_json::to_string_pretty(record)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        std::fs::write(work_dir.join("run_summary.json"), summary)?;
    }
    outcome
}
