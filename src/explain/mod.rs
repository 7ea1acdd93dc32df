//! Natural-language explanations of forecasts
//!
//! An [`Explainer`] turns a forecast value and a user question into prose,
//! grounded on summary statistics of the historical consumption data.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::TimeSeriesRecord;

pub mod ollama;

pub use ollama::OllamaExplainer;

/// Summary of the historical target series (Wh)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyStatistics {
    pub average: f64,
    pub peak: f64,
    pub minimum: f64,
    /// Sample standard deviation (n - 1)
    pub std_deviation: f64,
    pub samples: usize,
}

impl EnergyStatistics {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let n = values.len() as f64;
        let average = values.iter().sum::<f64>() / n;
        let peak = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let minimum = values.iter().copied().fold(f64::INFINITY, f64::min);
        let std_deviation = if values.len() > 1 {
            (values.iter().map(|v| (v - average).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        } else {
            0.0
        };

        Some(Self {
            average,
            peak,
            minimum,
            std_deviation,
            samples: values.len(),
        })
    }

    pub fn from_record(record: &TimeSeriesRecord) -> Option<Self> {
        Self::from_values(&record.targets())
    }

    /// Compact JSON handed to the language model as tool output
    pub fn to_prompt_json(&self) -> String {
        serde_json::json!({
            "avg_consumption": format!("{:.2} Wh", self.average),
            "peak_consumption": format!("{:.2} Wh", self.peak),
            "min_consumption": format!("{:.2} Wh", self.minimum),
            "std_deviation": format!("{:.2} Wh", self.std_deviation),
        })
        .to_string()
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Explainer: Send + Sync {
    async fn explain(&self, forecast_value: f64, question: &str) -> Result<String>;
}
