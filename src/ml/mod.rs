//! Machine Learning Module
//!
//! Everything needed to fit, evaluate and persist the two forecasting model
//! families:
//! - Gradient-boosted regression trees over engineered features
//! - Additive trend + seasonality decomposition over the raw series
//!
//! # Architecture
//! - `training` fits each family against a trailing holdout window
//! - `artifacts` persists fitted objects as independent, atomically replaced files
//! - `pipeline` drives one full training run and reports to `tracking`

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::ModelKind;

pub mod artifacts;
pub mod gbm;
pub mod pipeline;
pub mod seasonal;
pub mod tracking;
pub mod training;

/// Descriptive data stored alongside a fitted model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model: ModelKind,
    pub trained_at: chrono::DateTime<chrono::Utc>,
    pub training_samples: usize,
    pub validation_metrics: Option<ValidationMetrics>,
}

impl ModelMetadata {
    pub fn new(model: ModelKind, training_samples: usize) -> Self {
        Self {
            model,
            trained_at: chrono::Utc::now(),
            training_samples,
            validation_metrics: None,
        }
    }
}

/// Holdout error of one training run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationMetrics {
    /// Mean Absolute Error
    pub mae: f64,
    /// Root Mean Square Error
    pub rmse: f64,
    /// Number of holdout samples evaluated
    pub samples: usize,
}

impl ValidationMetrics {
    pub fn calculate(actual: &[f64], predicted: &[f64]) -> Result<Self, MetricsError> {
        if actual.len() != predicted.len() {
            return Err(MetricsError::DimensionMismatch {
                actual: actual.len(),
                predicted: predicted.len(),
            });
        }

        if actual.is_empty() {
            return Err(MetricsError::EmptyData);
        }

        let n = actual.len() as f64;
        let (abs_sum, sq_sum) = actual
            .iter()
            .zip(predicted.iter())
            .fold((0.0, 0.0), |(abs, sq), (a, p)| {
                let error = a - p;
                (abs + error.abs(), sq + error * error)
            });

        Ok(Self {
            mae: abs_sum / n,
            rmse: (sq_sum / n).sqrt(),
            samples: actual.len(),
        })
    }
}

impl fmt::Display for ValidationMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MAE={:.4}, RMSE={:.4} over {} samples",
            self.mae, self.rmse, self.samples
        )
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MetricsError {
    #[error("Dimension mismatch: actual={actual}, predicted={predicted}")]
    DimensionMismatch { actual: usize, predicted: usize },

    #[error("Empty data provided")]
    EmptyData,
}

/// Per-column standardization (zero mean, unit variance).
///
/// Fitted on the training partition only. Columns with zero variance keep a
/// unit scale so they are centred but not divided by zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScaler {
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
}

impl FeatureScaler {
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self, ScalerError> {
        let first = rows.first().ok_or(ScalerError::EmptyData)?;
        let width = first.len();
        let n = rows.len() as f64;

        let mut means = vec![0.0; width];
        for row in rows {
            if row.len() != width {
                return Err(ScalerError::WidthMismatch {
                    expected: width,
                    got: row.len(),
                });
            }
            for (m, v) in means.iter_mut().zip(row) {
                *m += v;
            }
        }
        means.iter_mut().for_each(|m| *m /= n);

        let mut variances = vec![0.0; width];
        for row in rows {
            for ((var, v), m) in variances.iter_mut().zip(row).zip(&means) {
                *var += (v - m).powi(2);
            }
        }

        let stds = variances
            .into_iter()
            .map(|var| {
                let std = (var / n).sqrt();
                if std < 1e-10 {
                    1.0
                } else {
                    std
                }
            })
            .collect();

        Ok(Self { means, stds })
    }

    pub fn width(&self) -> usize {
        self.means.len()
    }

    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>, ScalerError> {
        if row.len() != self.width() {
            return Err(ScalerError::WidthMismatch {
                expected: self.width(),
                got: row.len(),
            });
        }

        Ok(row
            .iter()
            .zip(self.means.iter().zip(self.stds.iter()))
            .map(|(v, (mean, std))| (v - mean) / std)
            .collect())
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ScalerError> {
        rows.iter().map(|row| self.transform_row(row)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScalerError {
    #[error("Cannot fit scaler on empty data")]
    EmptyData,

    #[error("Standardization width mismatch: expected {expected}, got {got}")]
    WidthMismatch { expected: usize, got: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_metrics() {
        let actual = vec![1.0, 2.0, 3.0, 4.0];
        let predicted = vec![1.0, 3.0, 3.0, 2.0];

        let metrics = ValidationMetrics::calculate(&actual, &predicted).unwrap();
        assert_eq!(metrics.mae, 0.75); // (0 + 1 + 0 + 2) / 4
        assert!((metrics.rmse - (5.0f64 / 4.0).sqrt()).abs() < 1e-12);
        assert_eq!(metrics.samples, 4);
    }

    #[test]
    fn test_validation_metrics_errors() {
        assert_eq!(
            ValidationMetrics::calculate(&[1.0], &[1.0, 2.0]),
            Err(MetricsError::DimensionMismatch { actual: 1, predicted: 2 })
        );
        assert_eq!(
            ValidationMetrics::calculate(&[], &[]),
            Err(MetricsError::EmptyData)
        );
    }

    #[test]
    fn test_scaler_standardizes_columns() {
        let rows = vec![vec![10.0, 5.0], vec![20.0, 5.0], vec![30.0, 5.0]];
        let scaler = FeatureScaler::fit(&rows).unwrap();

        assert_eq!(scaler.means, vec![20.0, 5.0]);
        // population std of 10, 20, 30
        assert!((scaler.stds[0] - (200.0f64 / 3.0).sqrt()).abs() < 1e-12);
        // constant column keeps unit scale
        assert_eq!(scaler.stds[1], 1.0);

        let scaled = scaler.transform(&rows).unwrap();
        assert_eq!(scaled[1], vec![0.0, 0.0]);
        assert!((scaled[0][0] + scaled[2][0]).abs() < 1e-12);
    }

    #[test]
    fn test_scaler_width_mismatch() {
        let scaler = FeatureScaler::fit(&[vec![1.0, 2.0]]).unwrap();
        assert_eq!(
            scaler.transform_row(&[1.0]),
            Err(ScalerError::WidthMismatch { expected: 2, got: 1 })
        );
        assert_eq!(FeatureScaler::fit(&[]), Err(ScalerError::EmptyData));
    }
}
