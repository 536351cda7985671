//! Experiment tracking sink
//!
//! The pipeline treats experiment tracking as a logging sink with a small
//! interface: activate a run, log parameters and metrics, attach artifacts
//! and figures. The in-memory backend backs tests and local runs; a real
//! tracking server would implement the same trait.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Final status of a tracked run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Running,
    Success,
    Failed,
}

/// One logged metric observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub step: u64,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// A rendered figure attached to a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Figure {
    pub name: String,
    pub content: Vec<u8>,
}

/// Experiment tracking backend.
pub trait TrackingSink: Send {
    /// Begin (or resume) a run under the named experiment; returns the run id.
    fn start_run(&mut self, experiment_name: &str, run_name: Option<&str>) -> Result<String>;

    fn log_param(&mut self, key: &str, value: &str) -> Result<()>;

    fn log_metric(&mut self, key: &str, step: u64, value: f64) -> Result<()>;

    /// Attach a file artifact to the active run.
    fn log_artifact(&mut self, path: &Path) -> Result<()>;

    fn log_figure(&mut self, figure: Figure) -> Result<()>;

    fn end_run(&mut self, status: RunStatus) -> Result<()>;
}

/// In-memory tracking backend.
#[derive(Debug, Default)]
pub struct InMemoryTracking {
    next_run: u64,
    active: Option<String>,
    pub runs: BTreeMap<String, RunRecord>,
}

/// Everything recorded for one run.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RunRecord {
    pub experiment_name: String,
    pub run_name: Option<String>,
    pub params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, Vec<MetricPoint>>,
    pub artifacts: Vec<PathBuf>,
    pub figures: Vec<Figure>,
    pub status: Option<RunStatus>,
}

impl InMemoryTracking {
    pub fn new() -> Self {
        Self::default()
    }

    fn active_run(&mut self) -> Result<&mut RunRecord> {
        let id = self
            .active
            .clone()
            .ok_or_else(|| Error::Tracking("no active run".to_string()))?;
        self.runs
            .get_mut(&id)
            .ok_or_else(|| Error::Tracking(format!("unknown run: {id}")))
    }
}

impl TrackingSink for InMemoryTracking {
    fn start_run(&mut self, experiment_name: &str, run_name: Option<&str>) -> Result<String> {
        if self.active.is_some() {
            return Err(Error::Tracking("a run is already active".to_string()));
        }
        self.next_run += 1;
        let id = format!("run-{}", self.next_run);
        self.runs.insert(
            id.clone(),
            RunRecord {
                experiment_name: experiment_name.to_string(),
                run_name: run_name.map(str::to_string),
                ..RunRecord::default()
            },
        );
        self.active = Some(id.clone());
        Ok(id)
    }

    fn log_param(&mut self, key: &str, value: &str) -> Result<()> {
        self.active_run()?
            .params
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn log_metric(&mut self, key: &str, step: u64, value: f64) -> Result<()> {
        self.active_run()?
            .metrics
            .entry(key.to_string())
            .or_default()
            .push(MetricPoint {
                step,
                value,
                timestamp: Utc::now(),
            });
        Ok(())
    }

    fn log_artifact(&mut self, path: &Path) -> Result<()> {
        self.active_run()?.artifacts.push(path.to_path_buf());
        Ok(())
    }

    fn log_figure(&mut self, figure: Figure) -> Result<()> {
        self.active_run()?.figures.push(figure);
        Ok(())
    }

    fn end_run(&mut self, status: RunStatus) -> Result<()> {
        self.active_run()?.status = Some(status);
        self.active = None;
        Ok(())
    }
}
