//! Feature engineering for the tree model
//!
//! Training rows carry sensor channels, calendar features and lagged targets.
//! Serving rows only know the calendar of the target hour; every other column
//! is filled with a neutral zero because future sensor readings and future
//! lag values are unknown at request time. The tree model is trained on real
//! sensor and lag signal, so at serve time it degrades towards a function of
//! the calendar alone. Feeding each step's prediction back in as the next
//! step's lag would be a separate, recursive scheme.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::TimeSeriesRecord;

/// Calendar columns, in schema order
pub const TEMPORAL_FEATURES: [&str; 3] = ["hour", "day_of_week", "month"];

/// Value used for every column that cannot be known at request time
pub const NEUTRAL_VALUE: f64 = 0.0;

/// Ordered feature column names shared by training and serving
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    columns: Vec<String>,
}

impl FeatureSchema {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    /// Sensor columns, then calendar columns, then lag columns
    pub fn assemble(sensors: &[String], lags: &[usize]) -> Self {
        let columns = sensors
            .iter()
            .cloned()
            .chain(TEMPORAL_FEATURES.iter().map(|s| s.to_string()))
            .chain(lags.iter().map(|lag| lag_column(*lag)))
            .collect();
        Self { columns }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

pub fn lag_column(lag: usize) -> String {
    format!("lag_{lag}")
}

/// Calendar features of one timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalFeatures {
    /// Hour of day (0-23)
    pub hour: u32,
    /// Day of week (0=Monday, 6=Sunday)
    pub day_of_week: u32,
    /// Month (1-12)
    pub month: u32,
}

impl TemporalFeatures {
    pub fn from_timestamp(timestamp: DateTime<Utc>) -> Self {
        Self {
            hour: timestamp.hour(),
            day_of_week: timestamp.weekday().num_days_from_monday(),
            month: timestamp.month(),
        }
    }

    fn value(&self, column: &str) -> Option<f64> {
        match column {
            "hour" => Some(self.hour as f64),
            "day_of_week" => Some(self.day_of_week as f64),
            "month" => Some(self.month as f64),
            _ => None,
        }
    }
}

/// One feature vector aligned with a [`FeatureSchema`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineeredFeatureRow {
    pub timestamp: DateTime<Utc>,
    pub values: Vec<f64>,
    /// Observed target; absent for serving rows
    pub target: Option<f64>,
}

/// Builds training and serving feature rows
pub struct FeatureBuilder {
    sensor_candidates: Vec<String>,
    lags: Vec<usize>,
}

impl FeatureBuilder {
    pub fn new(sensor_candidates: Vec<String>, lags: Vec<usize>) -> Self {
        Self {
            sensor_candidates,
            lags,
        }
    }

    pub fn max_lag(&self) -> usize {
        self.lags.iter().copied().max().unwrap_or(0)
    }

    /// Candidate sensor channels that the record actually carries, in candidate order
    pub fn available_sensors(&self, record: &TimeSeriesRecord) -> Vec<String> {
        self.sensor_candidates
            .iter()
            .filter(|c| record.has_column(c))
            .cloned()
            .collect()
    }

    /// Engineer training rows and the schema they follow.
    ///
    /// Lags are positional: row `i` gets the target of row `i - lag`. Leading
    /// rows without full lag history are dropped, as are rows missing a
    /// selected sensor value. Nothing is imputed.
    pub fn build_training_features(
        &self,
        record: &TimeSeriesRecord,
    ) -> (Vec<EngineeredFeatureRow>, FeatureSchema) {
        let sensors = self.available_sensors(record);
        if sensors.is_empty() {
            warn!("no sensor features found in dataset, using temporal and lag features only");
        } else {
            info!(count = sensors.len(), sensors = ?sensors, "using sensor features");
        }

        let schema = FeatureSchema::assemble(&sensors, &self.lags);
        info!(
            total = schema.len(),
            sensor = sensors.len(),
            temporal = TEMPORAL_FEATURES.len(),
            lag = self.lags.len(),
            "feature schema assembled"
        );

        let observations = record.observations();
        let max_lag = self.max_lag();
        let mut rows = Vec::with_capacity(observations.len().saturating_sub(max_lag));
        let mut incomplete = 0usize;

        for (i, obs) in observations.iter().enumerate().skip(max_lag) {
            let sensor_values: Option<Vec<f64>> = sensors.iter().map(|s| obs.sensor(s)).collect();
            let Some(mut values) = sensor_values else {
                incomplete += 1;
                continue;
            };

            let temporal = TemporalFeatures::from_timestamp(obs.timestamp);
            values.extend([
                temporal.hour as f64,
                temporal.day_of_week as f64,
                temporal.month as f64,
            ]);
            values.extend(self.lags.iter().map(|lag| observations[i - lag].target));

            rows.push(EngineeredFeatureRow {
                timestamp: obs.timestamp,
                values,
                target: Some(obs.target),
            });
        }

        if incomplete > 0 {
            warn!(rows = incomplete, "dropped rows with missing sensor values");
        }

        (rows, schema)
    }

    /// Feature rows for the `horizon` hours following `as_of`.
    ///
    /// Only the calendar columns carry information; sensors and lags are
    /// [`NEUTRAL_VALUE`].
    pub fn build_serving_features(
        schema: &FeatureSchema,
        as_of: DateTime<Utc>,
        horizon: usize,
    ) -> Vec<EngineeredFeatureRow> {
        (1..=horizon)
            .map(|step| {
                let timestamp = as_of + Duration::hours(step as i64);
                let temporal = TemporalFeatures::from_timestamp(timestamp);
                let values = schema
                    .columns()
                    .iter()
                    .map(|c| temporal.value(c).unwrap_or(NEUTRAL_VALUE))
                    .collect();
                EngineeredFeatureRow {
                    timestamp,
                    values,
                    target: None,
                }
            })
            .collect()
    }
}
