use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Forecasting model family
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ModelKind {
    /// Gradient-boosted regression trees over engineered features
    GradientBoosting,
    /// Additive trend + seasonality decomposition over the raw series
    SeasonalDecomposition,
}

impl ModelKind {
    pub fn from_tree_flag(use_tree_model: bool) -> Self {
        if use_tree_model {
            Self::GradientBoosting
        } else {
            Self::SeasonalDecomposition
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub timestamp: DateTime<Utc>,
    /// Predicted energy draw, never negative
    pub value: f64,
}

/// Point forecast for consecutive hours after the request time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub model: ModelKind,
    pub points: Vec<ForecastPoint>,
}

impl ForecastResult {
    pub fn new(model: ModelKind, timestamps: Vec<DateTime<Utc>>, values: Vec<f64>) -> Self {
        let points = timestamps
            .into_iter()
            .zip(values)
            .map(|(timestamp, value)| ForecastPoint { timestamp, value })
            .collect();
        Self { model, points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.points.iter().map(|p| p.timestamp).collect()
    }

    /// Timestamps rendered as ISO-8601 instants
    pub fn iso_timestamps(&self) -> Vec<String> {
        self.points.iter().map(|p| p.timestamp.to_rfc3339()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_model_kind_names() {
        assert_eq!(ModelKind::GradientBoosting.to_string(), "gradient_boosting");
        assert_eq!(
            ModelKind::SeasonalDecomposition.as_ref(),
            "seasonal_decomposition"
        );
        assert_eq!(
            ModelKind::from_str("gradient_boosting").unwrap(),
            ModelKind::GradientBoosting
        );
        assert_eq!(
            ModelKind::from_tree_flag(false),
            ModelKind::SeasonalDecomposition
        );
    }

    #[test]
    fn test_forecast_result_accessors() {
        let now = Utc::now();
        let stamps = vec![now, now + chrono::Duration::hours(1)];
        let result = ForecastResult::new(ModelKind::GradientBoosting, stamps.clone(), vec![1.0, 2.0]);

        assert_eq!(result.len(), 2);
        assert_eq!(result.values(), vec![1.0, 2.0]);
        assert_eq!(result.timestamps(), stamps);
        assert_eq!(result.iso_timestamps()[0], now.to_rfc3339());
    }
}
