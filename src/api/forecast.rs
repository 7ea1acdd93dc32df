use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{error::ApiError, ApiJson, AppState};

fn default_horizon() -> u32 {
    24
}

fn default_use_tree_model() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ForecastRequest {
    /// Hours to forecast (1-168)
    #[serde(default = "default_horizon")]
    #[validate(range(min = 1, max = 168))]
    pub horizon: u32,
    /// Gradient boosting (true) or seasonal decomposition (false)
    #[serde(default = "default_use_tree_model")]
    pub use_tree_model: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastResponse {
    pub values: Vec<f64>,
    pub timestamps: Vec<String>,
    pub model_name: String,
    pub horizon: u32,
}

/// POST /forecast - Forecast the next `horizon` hours
pub async fn create_forecast(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ForecastRequest>,
) -> Result<Json<ForecastResponse>, ApiError> {
    req.validate()?;

    let result = state
        .service
        .forecast(req.horizon as usize, req.use_tree_model)?;

    Ok(Json(ForecastResponse {
        values: result.values(),
        timestamps: result.iso_timestamps(),
        model_name: result.model.to_string(),
        horizon: req.horizon,
    }))
}
