use std::path::PathBuf;
use thiserror::Error;

use crate::domain::ModelKind;

/// Failures of the forecasting pipeline, from data preparation to serving
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("dataset not found at {}; run the dataset download first", path.display())]
    DataNotFound { path: PathBuf },

    #[error("insufficient data: {needed} rows required, {available} available ({context})")]
    InsufficientData {
        needed: usize,
        available: usize,
        context: &'static str,
    },

    #[error("{model} model not available; retrain required")]
    ModelUnavailable { model: ModelKind },

    #[error("artifact '{name}' is corrupt: {reason}")]
    ArtifactCorrupt { name: String, reason: String },

    #[error("horizon must be between {min} and {max} hours, got {got}")]
    InvalidHorizon { got: usize, min: usize, max: usize },

    #[error("required column '{0}' missing from dataset")]
    MissingColumn(String),

    #[error("invalid default start date '{0}'")]
    InvalidStartDate(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("model error: {0}")]
    Model(String),
}

impl ForecastError {
    pub fn model(message: impl std::fmt::Display) -> Self {
        Self::Model(message.to_string())
    }

    /// Errors the caller can recover from without retraining or restarting
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidHorizon { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_unavailable_names_the_family() {
        let err = ForecastError::ModelUnavailable {
            model: ModelKind::GradientBoosting,
        };
        assert_eq!(
            err.to_string(),
            "gradient_boosting model not available; retrain required"
        );
    }

    #[test]
    fn test_client_error_classification() {
        assert!(ForecastError::InvalidHorizon { got: 0, min: 1, max: 168 }.is_client_error());
        assert!(!ForecastError::model("boom").is_client_error());
    }
}
