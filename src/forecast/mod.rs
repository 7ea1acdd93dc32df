//! Forecasting pipeline: data preparation, feature engineering and serving

pub mod data;
pub mod error;
pub mod features;
pub mod service;

pub use data::DataPreparer;
pub use error::ForecastError;
pub use features::{FeatureBuilder, FeatureSchema};
pub use service::{ForecastService, ModelRegistry, RegistryState};
