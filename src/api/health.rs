use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::domain::ModelKind;
use crate::forecast::RegistryState;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub models_loaded: bool,
    pub tree_model: bool,
    pub seasonal_model: bool,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// GET /health - Liveness plus which model families can serve
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let registry = state.service.registry();
    Json(HealthResponse {
        status: "ok".to_string(),
        models_loaded: registry.state() == RegistryState::Ready,
        tree_model: registry.is_available(ModelKind::GradientBoosting),
        seasonal_model: registry.is_available(ModelKind::SeasonalDecomposition),
        timestamp: chrono::Utc::now(),
    })
}

/// GET / - Service description
pub async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Hourly energy consumption forecasting with natural-language explanations",
        "endpoints": {
            "health": "GET /health",
            "forecast": "POST /forecast",
            "explain": "POST /explain",
        },
        "models": [
            ModelKind::GradientBoosting.to_string(),
            ModelKind::SeasonalDecomposition.to_string(),
        ],
    }))
}
