//! Experiment tracking for training runs
//!
//! A run record carries the holdout scores of both model families, the
//! hyperparameters that produced them and the artifact paths written.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};
use uuid::Uuid;

use crate::config::Config;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub seasonal_mae: Option<f64>,
    pub seasonal_rmse: Option<f64>,
    pub gbm_mae: Option<f64>,
    pub gbm_rmse: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunParams {
    pub n_estimators: usize,
    pub max_depth: u16,
    pub learning_rate: f64,
    pub validation_hours: usize,
}

impl RunParams {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            n_estimators: cfg.training.gbm.n_estimators,
            max_depth: cfg.training.gbm.max_depth,
            learning_rate: cfg.training.gbm.learning_rate,
            validation_hours: cfg.training.validation_hours,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRun {
    pub run_id: Uuid,
    pub experiment: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub metrics: RunMetrics,
    pub params: RunParams,
    pub artifacts: Vec<PathBuf>,
}

pub trait TrackingSink: Send + Sync {
    fn record(&self, run: &TrainingRun) -> Result<()>;
}

/// Appends one JSON object per run to a local file
pub struct JsonLinesSink {
    path: PathBuf,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn read_all(&self) -> Result<Vec<TrainingRun>> {
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).context("Malformed run record"))
            .collect()
    }
}

impl TrackingSink for JsonLinesSink {
    fn record(&self, run: &TrainingRun) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;

        let mut line = serde_json::to_string(run)?;
        line.push('\n');
        file.write_all(line.as_bytes())?;

        tracing::info!(run_id = %run.run_id, path = %self.path.display(), "training run recorded");
        Ok(())
    }
}

/// Logs the run instead of persisting it
pub struct TracingSink;

impl TrackingSink for TracingSink {
    fn record(&self, run: &TrainingRun) -> Result<()> {
        tracing::info!(
            run_id = %run.run_id,
            experiment = %run.experiment,
            metrics = ?run.metrics,
            params = ?run.params,
            artifacts = run.artifacts.len(),
            "training run"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(experiment: &str) -> TrainingRun {
        let now = Utc::now();
        TrainingRun {
            run_id: Uuid::new_v4(),
            experiment: experiment.to_string(),
            started_at: now,
            finished_at: now,
            metrics: RunMetrics {
                seasonal_mae: Some(21.5),
                seasonal_rmse: Some(30.25),
                gbm_mae: None,
                gbm_rmse: None,
            },
            params: RunParams::from_config(&Config::default()),
            artifacts: vec![PathBuf::from("models/seasonal_model.bin")],
        }
    }

    #[test]
    fn test_json_lines_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonLinesSink::new(dir.path().join("mlruns").join("runs.jsonl"));

        let first = run("a");
        let second = run("b");
        sink.record(&first).unwrap();
        sink.record(&second).unwrap();

        let runs = sink.read_all().unwrap();
        assert_eq!(runs, vec![first, second]);
    }

    #[test]
    fn test_record_shape() {
        let value = serde_json::to_value(run("x")).unwrap();
        assert_eq!(value["params"]["n_estimators"], 100);
        assert_eq!(value["params"]["validation_hours"], 720);
        assert_eq!(value["metrics"]["seasonal_mae"], 21.5);
        assert!(value["metrics"]["gbm_mae"].is_null());
    }

    #[test]
    fn test_tracing_sink_never_fails() {
        assert!(TracingSink.record(&run("dry")).is_ok());
    }
}
