pub mod error;
pub mod explain;
pub mod forecast;
pub mod health;

use axum::{
    extract::FromRequest,
    routing::{get, post},
    Router,
};
use std::{sync::Arc, time::Duration};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::{config::Config, explain::Explainer, forecast::ForecastService};

/// Shared, read-only state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ForecastService>,
    pub explainer: Option<Arc<dyn Explainer>>,
}

impl AppState {
    pub fn new(service: Arc<ForecastService>, explainer: Option<Arc<dyn Explainer>>) -> Self {
        Self { service, explainer }
    }
}

/// `Json` whose rejections go through [`ApiError`], so body decoding
/// failures answer 400 with the same error shape as validation failures
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(error::ApiError))]
pub struct ApiJson<T>(pub T);

pub fn router(state: AppState, cfg: &Config) -> Router {
    let mut router = Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health_check))
        .route("/forecast", post(forecast::create_forecast))
        .route("/explain", post(explain::explain))
        .with_state(state);

    if cfg.server.enable_cors {
        use tower_http::cors::Any;
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
            .allow_headers([axum::http::header::CONTENT_TYPE]);
        router = router.layer(cors);
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(axum::extract::DefaultBodyLimit::max(64 * 1024))
                .layer(TimeoutLayer::new(Duration::from_secs(cfg.server.request_timeout_secs))),
        )
        .layer(TraceLayer::new_for_http())
}

#[cfg(feature = "metrics")]
pub fn with_metrics(app: Router) -> Router {
    use axum_prometheus::PrometheusMetricLayer;
    let (layer, handle) = PrometheusMetricLayer::pair();

    let metrics_router =
        Router::new().route("/metrics", get(move || async move { handle.render() }));

    app.layer(layer).merge(metrics_router)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explain::MockExplainer;
    use crate::forecast::ModelRegistry;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    fn app(explainer: Option<Arc<dyn Explainer>>) -> Router {
        let service = Arc::new(ForecastService::new(Arc::new(ModelRegistry::empty())));
        router(AppState::new(service, explainer), &Config::default())
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(resp: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_forecast_without_models_is_unavailable() {
        let resp = app(None)
            .oneshot(post_json("/forecast", "{}"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = json_body(resp).await;
        assert!(body["message"].as_str().unwrap().contains("gradient_boosting"));
    }

    #[tokio::test]
    async fn test_forecast_rejects_out_of_range_horizon() {
        let resp = app(None)
            .oneshot(post_json("/forecast", r#"{"horizon": 200, "use_tree_model": false}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_forecast_rejects_undecodable_horizon() {
        for body in [
            r#"{"horizon": -1}"#,
            r#"{"horizon": 2.5}"#,
            r#"{"horizon": 4294967296}"#,
            r#"{"horizon": "x"}"#,
        ] {
            let resp = app(None).oneshot(post_json("/forecast", body)).await.unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body: {body}");
            let json = json_body(resp).await;
            assert_eq!(json["error"], "BadRequest", "body: {body}");
            assert!(json["message"].is_string());
        }
    }

    #[tokio::test]
    async fn test_explain_rejects_malformed_body() {
        let resp = app(None)
            .oneshot(post_json("/explain", r#"{"question": 42}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await["error"], "BadRequest");
    }

    #[tokio::test]
    async fn test_explain_uses_explainer() {
        let mut mock = MockExplainer::new();
        mock.expect_explain()
            .withf(|value, question| *value == 62.5 && question.to_string() == "Why so high?")
            .times(1)
            .returning(|_, _| Ok("Evening cooking load.".to_string()));

        let resp = app(Some(Arc::new(mock)))
            .oneshot(post_json("/explain", r#"{"question": "Why so high?"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["explanation"], "Evening cooking load.");
        assert_eq!(body["question"], "Why so high?");
    }

    #[tokio::test]
    async fn test_explain_without_explainer_is_unavailable() {
        let resp = app(None)
            .oneshot(post_json("/explain", r#"{"question": "Why?"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_explainer_failure_is_internal_error() {
        let mut mock = MockExplainer::new();
        mock.expect_explain()
            .returning(|_, _| Err(anyhow::anyhow!("connection refused")));

        let resp = app(Some(Arc::new(mock)))
            .oneshot(post_json("/explain", r#"{"question": "Why?", "forecast_value": 10.0}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_health_reports_model_availability() {
        let resp = app(None)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["models_loaded"], false);
        assert_eq!(body["tree_model"], false);
    }
}
