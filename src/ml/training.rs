//! Model training against a trailing holdout window
//!
//! Both trainers split chronologically: the last `validation_hours` rows are
//! held out, everything before them is fitted. Rows are never shuffled.

use tracing::info;

use super::gbm::GradientBoostedTrees;
use super::seasonal::SeasonalDecomposition;
use super::{FeatureScaler, ValidationMetrics};
use crate::config::{Config, GbmConfig, SeasonalConfig};
use crate::domain::TimeSeriesRecord;
use crate::forecast::features::{FeatureBuilder, FeatureSchema};
use crate::forecast::ForecastError;

/// Split `rows` into a training prefix and a trailing holdout of exactly `holdout` rows.
///
/// Fails when no training row would remain.
pub fn holdout_split<'a, T>(
    rows: &'a [T],
    holdout: usize,
    context: &'static str,
) -> Result<(&'a [T], &'a [T]), ForecastError> {
    if holdout == 0 {
        return Err(ForecastError::model("validation window must cover at least one row"));
    }
    if rows.len() <= holdout {
        return Err(ForecastError::InsufficientData {
            needed: holdout + 1,
            available: rows.len(),
            context,
        });
    }
    Ok(rows.split_at(rows.len() - holdout))
}

/// Everything the tree family persists, plus its holdout score
#[derive(Debug)]
pub struct GbmTrainingOutput {
    pub model: GradientBoostedTrees,
    pub scaler: FeatureScaler,
    pub schema: FeatureSchema,
    pub metrics: ValidationMetrics,
    pub train_rows: usize,
    pub validation_rows: usize,
}

pub struct TrainerGbm {
    builder: FeatureBuilder,
    params: GbmConfig,
    holdout: usize,
}

impl TrainerGbm {
    pub fn new(builder: FeatureBuilder, params: GbmConfig, holdout: usize) -> Self {
        Self {
            builder,
            params,
            holdout,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(
            FeatureBuilder::new(cfg.data.sensor_columns.clone(), cfg.training.lags.clone()),
            cfg.training.gbm.clone(),
            cfg.training.validation_hours,
        )
    }

    pub fn train(&self, record: &TimeSeriesRecord) -> Result<GbmTrainingOutput, ForecastError> {
        let (rows, schema) = self.builder.build_training_features(record);
        if rows.is_empty() {
            return Err(ForecastError::InsufficientData {
                needed: self.builder.max_lag() + 1,
                available: record.len(),
                context: "no fully lagged feature rows",
            });
        }

        let (train, validation) = holdout_split(&rows, self.holdout, "engineered feature rows")?;
        info!(
            train_rows = train.len(),
            validation_rows = validation.len(),
            features = schema.len(),
            "training gradient boosting model"
        );

        let train_x: Vec<Vec<f64>> = train.iter().map(|r| r.values.clone()).collect();
        let train_y: Vec<f64> = train.iter().filter_map(|r| r.target).collect();
        let val_x: Vec<Vec<f64>> = validation.iter().map(|r| r.values.clone()).collect();
        let val_y: Vec<f64> = validation.iter().filter_map(|r| r.target).collect();

        let scaler = FeatureScaler::fit(&train_x).map_err(ForecastError::model)?;
        let train_scaled = scaler.transform(&train_x).map_err(ForecastError::model)?;
        let val_scaled = scaler.transform(&val_x).map_err(ForecastError::model)?;

        let mut model = GradientBoostedTrees::train(
            &train_scaled,
            &train_y,
            self.params.clone(),
            schema.columns().to_vec(),
        )
        .map_err(ForecastError::model)?;

        let predictions = model.predict(&val_scaled).map_err(ForecastError::model)?;
        let metrics =
            ValidationMetrics::calculate(&val_y, &predictions).map_err(ForecastError::model)?;
        model.metadata.validation_metrics = Some(metrics);

        info!(
            mae = metrics.mae,
            rmse = metrics.rmse,
            "gradient boosting validation"
        );

        Ok(GbmTrainingOutput {
            model,
            scaler,
            schema,
            metrics,
            train_rows: train.len(),
            validation_rows: validation.len(),
        })
    }
}

#[derive(Debug)]
pub struct SeasonalTrainingOutput {
    pub model: SeasonalDecomposition,
    pub metrics: ValidationMetrics,
    pub train_rows: usize,
    pub validation_rows: usize,
}

pub struct TrainerSeasonal {
    config: SeasonalConfig,
    holdout: usize,
}

impl TrainerSeasonal {
    pub fn new(config: SeasonalConfig, holdout: usize) -> Self {
        Self { config, holdout }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.training.seasonal.clone(), cfg.training.validation_hours)
    }

    /// Fit on (timestamp, target) pairs only; sensors are ignored
    pub fn train(&self, record: &TimeSeriesRecord) -> Result<SeasonalTrainingOutput, ForecastError> {
        let points = record.points();
        let (train, validation) = holdout_split(&points, self.holdout, "time series rows")?;
        info!(
            train_rows = train.len(),
            validation_rows = validation.len(),
            "training seasonal decomposition model"
        );

        let mut model =
            SeasonalDecomposition::fit(train, self.config.clone()).map_err(ForecastError::model)?;

        // One pass over history plus the holdout span; the tail lines up with `validation`.
        let frame = model.future_frame(validation.len());
        let forecast = model.predict(&frame).map_err(ForecastError::model)?;
        let predicted: Vec<f64> = forecast[train.len()..].iter().map(|p| p.yhat).collect();
        let actual: Vec<f64> = validation.iter().map(|(_, y)| *y).collect();

        let metrics =
            ValidationMetrics::calculate(&actual, &predicted).map_err(ForecastError::model)?;
        model.metadata.validation_metrics = Some(metrics);

        info!(mae = metrics.mae, rmse = metrics.rmse, "seasonal validation");

        Ok(SeasonalTrainingOutput {
            model,
            metrics,
            train_rows: train.len(),
            validation_rows: validation.len(),
        })
    }
}
