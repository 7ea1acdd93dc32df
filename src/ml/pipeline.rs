//! One end-to-end training run
//!
//! prepare → seasonal fit + save → tree fit + save → tracking record.
//! A failed tree fit still records the seasonal scores, with no tree metrics.
//! The seasonal artifact is saved before tree training starts, so it stays
//! usable when the tree family fails (e.g. too little lagged history).

use anyhow::{Context, Result};
use chrono::Utc;
use std::path::PathBuf;
use tracing::{info, warn};
use uuid::Uuid;

use super::artifacts::{ArtifactName, ArtifactStore};
use super::tracking::{RunMetrics, RunParams, TrackingSink, TrainingRun};
use super::training::{TrainerGbm, TrainerSeasonal};
use super::ValidationMetrics;
use crate::config::Config;
use crate::forecast::data::DataPreparer;

#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub run_id: Uuid,
    pub rows: usize,
    pub seasonal: ValidationMetrics,
    pub gbm: ValidationMetrics,
    pub artifacts: Vec<PathBuf>,
}

pub fn run_training(cfg: &Config, sink: &dyn TrackingSink) -> Result<TrainingSummary> {
    let started_at = Utc::now();
    let run_id = Uuid::new_v4();
    info!(%run_id, experiment = %cfg.tracking.experiment, "starting training run");

    let record = DataPreparer::new(&cfg.data).load(&cfg.data.csv_path)?;
    let store = ArtifactStore::new(&cfg.artifacts.dir);
    let mut artifacts = Vec::new();

    let seasonal = TrainerSeasonal::from_config(cfg).train(&record)?;
    artifacts.push(store.save(ArtifactName::SeasonalModel, &seasonal.model)?);
    info!(metrics = %seasonal.metrics, "seasonal model saved");

    let mut metrics = RunMetrics {
        seasonal_mae: Some(seasonal.metrics.mae),
        seasonal_rmse: Some(seasonal.metrics.rmse),
        ..RunMetrics::default()
    };
    let record_run = |metrics: RunMetrics, artifacts: &[PathBuf]| {
        let run = TrainingRun {
            run_id,
            experiment: cfg.tracking.experiment.clone(),
            started_at,
            finished_at: Utc::now(),
            metrics,
            params: RunParams::from_config(cfg),
            artifacts: artifacts.to_vec(),
        };
        sink.record(&run).context("Failed to record training run")
    };

    let gbm = match TrainerGbm::from_config(cfg).train(&record) {
        Ok(gbm) => gbm,
        Err(e) => {
            warn!(%run_id, error = %e, "tree training failed, recording seasonal-only run");
            if let Err(record_err) = record_run(metrics, &artifacts) {
                warn!(%run_id, error = %format!("{record_err:#}"), "partial run not recorded");
            }
            return Err(e.into());
        }
    };
    artifacts.push(store.save(ArtifactName::GbmModel, &gbm.model)?);
    artifacts.push(store.save(ArtifactName::GbmScaler, &gbm.scaler)?);
    artifacts.push(store.save(ArtifactName::FeatureSchema, &gbm.schema)?);
    info!(metrics = %gbm.metrics, "gradient boosting model saved");

    metrics.gbm_mae = Some(gbm.metrics.mae);
    metrics.gbm_rmse = Some(gbm.metrics.rmse);
    record_run(metrics, &artifacts)?;

    info!(%run_id, dir = %store.dir().display(), "training complete");
    Ok(TrainingSummary {
        run_id,
        rows: record.len(),
        seasonal: seasonal.metrics,
        gbm: gbm.metrics,
        artifacts,
    })
}
