use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{error::ApiError, ApiJson, AppState};

fn default_forecast_value() -> f64 {
    62.5
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ExplainRequest {
    #[validate(length(min = 1))]
    pub question: String,
    /// Forecast value to explain (Wh)
    #[serde(default = "default_forecast_value")]
    pub forecast_value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainResponse {
    pub question: String,
    pub explanation: String,
    pub timestamp: DateTime<Utc>,
}

/// POST /explain - Natural-language explanation of a forecast value
pub async fn explain(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ExplainRequest>,
) -> Result<Json<ExplainResponse>, ApiError> {
    req.validate()?;

    let explainer = state
        .explainer
        .as_ref()
        .ok_or_else(|| ApiError::ServiceUnavailable("explainer not initialized".to_string()))?;

    let explanation = explainer
        .explain(req.forecast_value, &req.question)
        .await
        .map_err(|e| ApiError::InternalError(format!("explanation error: {e:#}")))?;

    Ok(Json(ExplainResponse {
        question: req.question,
        explanation,
        timestamp: Utc::now(),
    }))
}
