use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub data: DataConfig,
    pub artifacts: ArtifactsConfig,
    pub training: TrainingConfig,
    pub tracking: TrackingConfig,
    pub explainer: ExplainerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            request_timeout_secs: 30,
            enable_cors: true,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

/// Dataset location and column layout
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DataConfig {
    pub csv_path: PathBuf,
    pub date_column: String,
    pub target_column: String,
    /// First timestamp used when the dataset carries no date column
    pub default_start_date: String,
    /// Sensor channels the tree model may use, in schema order
    pub sensor_columns: Vec<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        let mut sensor_columns = vec!["lights".to_string()];
        for zone in 1..=9 {
            sensor_columns.push(format!("T{zone}"));
            sensor_columns.push(format!("RH_{zone}"));
        }
        sensor_columns.extend(
            ["T_out", "Press_mm_hg", "RH_out", "Windspeed", "Visibility", "Tdewpoint"]
                .iter()
                .map(|s| s.to_string()),
        );

        Self {
            csv_path: PathBuf::from("data/appliances_energy.csv"),
            date_column: "date".to_string(),
            target_column: "Appliances".to_string(),
            default_start_date: "2023-01-01".to_string(),
            sensor_columns,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArtifactsConfig {
    pub dir: PathBuf,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("models"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrainingConfig {
    /// Trailing holdout length in hourly rows (30 days)
    pub validation_hours: usize,
    pub lags: Vec<usize>,
    pub gbm: GbmConfig,
    pub seasonal: SeasonalConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            validation_hours: 30 * 24,
            lags: vec![1, 24, 168],
            gbm: GbmConfig::default(),
            seasonal: SeasonalConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GbmConfig {
    pub n_estimators: usize,
    pub max_depth: u16,
    pub learning_rate: f64,
    pub min_samples_leaf: usize,
    pub min_samples_split: usize,
}

impl Default for GbmConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 6,
            learning_rate: 0.1,
            min_samples_leaf: 1,
            min_samples_split: 2,
        }
    }
}

/// Weekly seasonality is enabled automatically once history covers two weeks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Toggle {
    Auto,
    On,
    Off,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SeasonalConfig {
    pub yearly: bool,
    pub weekly: Toggle,
    pub daily: bool,
    pub interval_width: f64,
    pub n_changepoints: usize,
    pub changepoint_range: f64,
    pub changepoint_prior_scale: f64,
    pub seasonality_prior_scale: f64,
}

impl Default for SeasonalConfig {
    fn default() -> Self {
        Self {
            yearly: true,
            weekly: Toggle::Auto,
            daily: true,
            interval_width: 0.95,
            n_changepoints: 25,
            changepoint_range: 0.8,
            changepoint_prior_scale: 0.05,
            seasonality_prior_scale: 10.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackingConfig {
    pub experiment: String,
    pub runs_path: PathBuf,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            experiment: "energy-wise-forecasting".to_string(),
            runs_path: PathBuf::from("mlruns/runs.jsonl"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExplainerConfig {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    pub top_p: f64,
    pub timeout_secs: u64,
}

impl Default for ExplainerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:11434".to_string(),
            model: "gpt-oss:120b-cloud".to_string(),
            temperature: 0.3,
            top_p: 0.9,
            timeout_secs: 30,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::figment("config/default.toml")
    }

    fn figment(path: &str) -> Result<Self> {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("EWF__").split("__"));
        Ok(figment.extract()?)
    }
}
