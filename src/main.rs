use anyhow::Result;
use axum::Router;
use energy_forecast::{
    api,
    config::Config,
    explain::{EnergyStatistics, Explainer, OllamaExplainer},
    forecast::{DataPreparer, ForecastService, ModelRegistry, RegistryState},
    ml::artifacts::ArtifactStore,
    telemetry,
};
use std::sync::Arc;
use tracing::{info, warn};

fn build_explainer(cfg: &Config) -> Option<Arc<dyn Explainer>> {
    if !cfg.explainer.enabled {
        info!("explainer disabled");
        return None;
    }

    let statistics = match DataPreparer::new(&cfg.data).load(&cfg.data.csv_path) {
        Ok(record) => EnergyStatistics::from_record(&record),
        Err(e) => {
            warn!(error = %e, "energy statistics unavailable for explanations");
            None
        }
    };

    match OllamaExplainer::new(&cfg.explainer, statistics) {
        Ok(explainer) => {
            info!(base_url = %cfg.explainer.base_url, model = %cfg.explainer.model, "explainer initialized");
            Some(Arc::new(explainer))
        }
        Err(e) => {
            warn!(error = %e, "could not initialize explainer");
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let cfg = Config::load()?;

    let store = ArtifactStore::new(&cfg.artifacts.dir);
    let registry = Arc::new(ModelRegistry::load(&store));
    if registry.state() == RegistryState::Uninitialized {
        warn!("no models found, run energy-forecast-train first");
    }

    let service = Arc::new(ForecastService::new(registry));
    let state = api::AppState::new(service, build_explainer(&cfg));

    #[allow(unused_mut)]
    let mut app: Router = api::router(state, &cfg);

    #[cfg(feature = "metrics")]
    {
        app = api::with_metrics(app);
    }

    let addr = cfg.server.socket_addr()?;

    if cfg.server.host == "0.0.0.0" {
        warn!("server binding to 0.0.0.0, service will be reachable from the network");
    }

    info!(%addr, "starting energy forecast server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(telemetry::shutdown_signal())
        .await?;

    warn!("shutdown complete");
    Ok(())
}
