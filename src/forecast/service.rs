//! Serving side of the pipeline
//!
//! [`ModelRegistry`] is built once at startup from whatever artifacts exist
//! and is never mutated afterwards; [`ForecastService`] only reads from it,
//! so concurrent requests need no coordination.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::features::{FeatureBuilder, FeatureSchema};
use super::ForecastError;
use crate::domain::{ForecastResult, ModelKind};
use crate::ml::artifacts::{ArtifactName, ArtifactStore};
use crate::ml::gbm::GradientBoostedTrees;
use crate::ml::seasonal::SeasonalDecomposition;
use crate::ml::FeatureScaler;

pub const MIN_HORIZON: usize = 1;
pub const MAX_HORIZON: usize = 168;

/// Tree model plus the schema it was trained on; the scaler is optional
#[derive(Debug)]
pub struct TreeModelBundle {
    pub model: GradientBoostedTrees,
    pub scaler: Option<FeatureScaler>,
    pub schema: FeatureSchema,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    /// No model family loaded
    Uninitialized,
    /// At least one model family can serve
    Ready,
}

#[derive(Debug, Default)]
pub struct ModelRegistry {
    tree: Option<TreeModelBundle>,
    seasonal: Option<SeasonalDecomposition>,
}

impl ModelRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_tree(mut self, bundle: TreeModelBundle) -> Self {
        self.tree = Some(bundle);
        self
    }

    pub fn with_seasonal(mut self, model: SeasonalDecomposition) -> Self {
        self.seasonal = Some(model);
        self
    }

    /// Load every artifact once. Missing or corrupt artifacts leave their family unavailable.
    pub fn load(store: &ArtifactStore) -> Self {
        let seasonal = store.load(ArtifactName::SeasonalModel).into_option();
        let model: Option<GradientBoostedTrees> = store.load(ArtifactName::GbmModel).into_option();
        let schema: Option<FeatureSchema> = store.load(ArtifactName::FeatureSchema).into_option();
        let scaler: Option<FeatureScaler> = store.load(ArtifactName::GbmScaler).into_option();

        let tree = match (model, schema) {
            (Some(model), Some(schema)) => Self::assemble_tree(model, schema, scaler),
            (Some(_), None) => {
                warn!("tree model present without feature schema, tree family unavailable");
                None
            }
            _ => None,
        };

        let registry = Self { tree, seasonal };
        info!(
            dir = %store.dir().display(),
            tree_model = registry.tree.is_some(),
            seasonal_model = registry.seasonal.is_some(),
            state = ?registry.state(),
            "model registry loaded"
        );
        registry
    }

    fn assemble_tree(
        model: GradientBoostedTrees,
        schema: FeatureSchema,
        scaler: Option<FeatureScaler>,
    ) -> Option<TreeModelBundle> {
        if model.feature_names() != schema.columns() {
            error!(
                model_features = model.feature_names().len(),
                schema_features = schema.len(),
                "feature schema does not match tree model, tree family unavailable"
            );
            return None;
        }
        if let Some(scaler) = &scaler {
            if scaler.width() != schema.len() {
                error!(
                    scaler_width = scaler.width(),
                    schema_features = schema.len(),
                    "scaler does not match feature schema, tree family unavailable"
                );
                return None;
            }
        } else {
            warn!("feature scaler absent, tree model will receive raw feature values");
        }
        Some(TreeModelBundle {
            model,
            scaler,
            schema,
        })
    }

    pub fn state(&self) -> RegistryState {
        if self.tree.is_some() || self.seasonal.is_some() {
            RegistryState::Ready
        } else {
            RegistryState::Uninitialized
        }
    }

    pub fn is_available(&self, kind: ModelKind) -> bool {
        match kind {
            ModelKind::GradientBoosting => self.tree.is_some(),
            ModelKind::SeasonalDecomposition => self.seasonal.is_some(),
        }
    }

    pub fn tree(&self) -> Option<&TreeModelBundle> {
        self.tree.as_ref()
    }

    pub fn seasonal(&self) -> Option<&SeasonalDecomposition> {
        self.seasonal.as_ref()
    }
}

pub struct ForecastService {
    registry: Arc<ModelRegistry>,
}

impl ForecastService {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn forecast(
        &self,
        horizon: usize,
        use_tree_model: bool,
    ) -> Result<ForecastResult, ForecastError> {
        self.forecast_at(Utc::now(), horizon, use_tree_model)
    }

    /// Forecast the `horizon` hours after `now`. Never falls back to the other family.
    pub fn forecast_at(
        &self,
        now: DateTime<Utc>,
        horizon: usize,
        use_tree_model: bool,
    ) -> Result<ForecastResult, ForecastError> {
        if !(MIN_HORIZON..=MAX_HORIZON).contains(&horizon) {
            return Err(ForecastError::InvalidHorizon {
                got: horizon,
                min: MIN_HORIZON,
                max: MAX_HORIZON,
            });
        }

        let kind = ModelKind::from_tree_flag(use_tree_model);
        let raw = match kind {
            ModelKind::GradientBoosting => {
                let bundle = self
                    .registry
                    .tree()
                    .ok_or(ForecastError::ModelUnavailable { model: kind })?;
                Self::tree_forecast(bundle, now, horizon)?
            }
            ModelKind::SeasonalDecomposition => {
                let model = self
                    .registry
                    .seasonal()
                    .ok_or(ForecastError::ModelUnavailable { model: kind })?;
                Self::seasonal_forecast(model, horizon)?
            }
        };

        let values: Vec<f64> = raw.into_iter().map(|v| v.max(0.0)).collect();
        let timestamps = (1..=horizon)
            .map(|step| now + Duration::hours(step as i64))
            .collect();

        debug!(model = %kind, horizon, "forecast served");
        Ok(ForecastResult::new(kind, timestamps, values))
    }

    fn tree_forecast(
        bundle: &TreeModelBundle,
        now: DateTime<Utc>,
        horizon: usize,
    ) -> Result<Vec<f64>, ForecastError> {
        let rows: Vec<Vec<f64>> = FeatureBuilder::build_serving_features(&bundle.schema, now, horizon)
            .into_iter()
            .map(|row| row.values)
            .collect();

        let inputs = match &bundle.scaler {
            Some(scaler) => scaler.transform(&rows).map_err(ForecastError::model)?,
            None => rows,
        };

        bundle.model.predict(&inputs).map_err(ForecastError::model)
    }

    /// Continues from the end of the fitted history
    fn seasonal_forecast(
        model: &SeasonalDecomposition,
        horizon: usize,
    ) -> Result<Vec<f64>, ForecastError> {
        let frame = model.future_frame(horizon);
        let tail = &frame[frame.len() - horizon..];
        let predictions = model.predict(tail).map_err(ForecastError::model)?;
        Ok(predictions.into_iter().map(|p| p.yhat).collect())
    }
}
