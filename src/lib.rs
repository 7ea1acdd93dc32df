//! Hourly energy consumption forecasting
//!
//! Training turns a historical sensor dataset into two independently
//! persisted model families; serving loads whatever was persisted and answers
//! horizon forecasts of 1 to 168 hours.

pub mod api;
pub mod config;
pub mod domain;
pub mod explain;
pub mod forecast;
pub mod ml;
pub mod telemetry;
