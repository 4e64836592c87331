use anyhow::Result;
use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{
    config::Config,
    handlers::{self, buildlogger::BuildloggerState},
    metrics,
    signals::setup_signal_handlers,
    store::{LogStore, MemoryStore},
};

/// Start the buildlogger gateway
///
/// This function:
/// 1. Initializes metrics (when enabled)
/// 2. Builds the log store
/// 3. Creates the Axum application
/// 4. Binds to the configured address
/// 5. Serves requests with graceful shutdown support
pub async fn start_server(config: Config) -> Result<()> {
    let metrics_handle = if config.metrics.enabled {
        info!("Initializing Prometheus metrics...");
        Some(Arc::new(metrics::init_metrics()?))
    } else {
        None
    };

    let store = build_store(&config)?;
    let state = BuildloggerState::new(store, config.buildlogger.base_url.as_str())
        .with_request_timeout(Duration::from_secs(config.server.request_timeout_seconds));
    let app = create_router(&config, state, metrics_handle);

    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));

    let (shutdown_tx, signal_handle) = setup_signal_handlers();
    let mut shutdown_rx = shutdown_tx.subscribe();

    info!("Starting buildlogger gateway on {}", addr);
    info!(
        "Configuration: base url {}, request timeout {}s, metrics {}",
        config.buildlogger.base_url,
        config.server.request_timeout_seconds,
        if config.metrics.enabled { "enabled" } else { "disabled" }
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("Shutdown signal received, draining connections...");
        })
        .await?;

    signal_handle.await?;
    info!("Server stopped gracefully");

    Ok(())
}

/// Build the log store from configuration
pub fn build_store(config: &Config) -> Result<Arc<dyn LogStore>> {
    let store = match &config.store.seed_file {
        Some(path) => MemoryStore::from_json_file(path)?,
        None => {
            warn!("No store.seed_file configured, serving an empty log store");
            MemoryStore::default()
        }
    };
    Ok(Arc::new(store))
}

/// Create the Axum router with all routes and middleware
pub fn create_router(
    config: &Config,
    state: BuildloggerState,
    metrics_handle: Option<Arc<PrometheusHandle>>,
) -> Router {
    use handlers::buildlogger as bl;

    let buildlogger_routes = Router::new()
        .route("/buildlogger/:id", get(bl::get_log_by_id))
        .route("/buildlogger/:id/meta", get(bl::get_log_meta_by_id))
        .route("/buildlogger/task_id/:task_id", get(bl::get_logs_by_task_id))
        .route(
            "/buildlogger/task_id/:task_id/meta",
            get(bl::get_log_meta_by_task_id),
        )
        .route(
            "/buildlogger/test_name/:task_id/:test_name",
            get(bl::get_logs_by_test_name),
        )
        .route(
            "/buildlogger/test_name/:task_id/:test_name/meta",
            get(bl::get_log_meta_by_test_name),
        )
        .route(
            "/buildlogger/test_name/:task_id/:test_name/group/:group_id",
            get(bl::get_log_group),
        )
        .route("/ready", get(handlers::health::readiness_check))
        .with_state(state);

    let mut app = Router::new()
        .route("/health", get(handlers::health::health_check))
        .merge(buildlogger_routes);

    if let Some(handle) = metrics_handle {
        app = app.merge(
            Router::new()
                .route(
                    &config.metrics.endpoint,
                    get(handlers::metrics_handler::metrics),
                )
                .with_state(handle),
        );
    }

    app.layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;

    #[test]
    fn test_build_store_without_seed_is_empty() {
        let config = Config::default();
        assert!(build_store(&config).is_ok());
    }

    #[test]
    fn test_build_store_missing_seed_fails() {
        let config = Config {
            store: StoreConfig {
                seed_file: Some("/nonexistent/logs.json".to_string()),
            },
            ..Default::default()
        };
        let err = build_store(&config).err().unwrap();
        assert!(err.to_string().contains("Failed to read log seed file"));
    }

    #[tokio::test]
    async fn test_create_router() {
        let config = Config::default();
        let state = BuildloggerState::new(Arc::new(MemoryStore::default()), "http://localhost:8080");

        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let metrics_handle = Arc::new(recorder.handle());

        let _app = create_router(&config, state, Some(metrics_handle));
        // Router created successfully - no panic
    }
}
