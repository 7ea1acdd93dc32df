use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One prepared row of the dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    pub target: f64,
    /// Numeric sensor channels; a channel missing from the map had no value in this row
    pub sensors: BTreeMap<String, f64>,
}

impl Observation {
    pub fn new(timestamp: DateTime<Utc>, target: f64) -> Self {
        Self {
            timestamp,
            target,
            sensors: BTreeMap::new(),
        }
    }

    pub fn with_sensor(mut self, name: impl Into<String>, value: f64) -> Self {
        self.sensors.insert(name.into(), value);
        self
    }

    pub fn sensor(&self, name: &str) -> Option<f64> {
        self.sensors.get(name).copied()
    }
}

/// Chronologically ordered time series with strictly increasing timestamps.
///
/// Construction sorts the observations (stable) and keeps the first row for
/// any repeated timestamp, so every record in circulation upholds the ordering
/// invariant regardless of how it was built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesRecord {
    target_column: String,
    columns: Vec<String>,
    observations: Vec<Observation>,
}

impl TimeSeriesRecord {
    pub fn new(
        target_column: impl Into<String>,
        columns: Vec<String>,
        mut observations: Vec<Observation>,
    ) -> Self {
        observations.sort_by_key(|o| o.timestamp);
        observations.dedup_by_key(|o| o.timestamp);
        Self {
            target_column: target_column.into(),
            columns,
            observations,
        }
    }

    pub fn target_column(&self) -> &str {
        &self.target_column
    }

    /// Sensor column names in dataset order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn targets(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.target).collect()
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.observations.iter().map(|o| o.timestamp).collect()
    }

    /// (timestamp, target) pairs, the only input of the seasonal model
    pub fn points(&self) -> Vec<(DateTime<Utc>, f64)> {
        self.observations
            .iter()
            .map(|o| (o.timestamp, o.target))
            .collect()
    }

    pub fn span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match (self.observations.first(), self.observations.last()) {
            (Some(first), Some(last)) => Some((first.timestamp, last.timestamp)),
            _ => None,
        }
    }
}
