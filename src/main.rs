use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use rdap_service::{BatchResponse, Config, LookupClient, LookupError, ServiceMap};

mod metrics;

const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct AppState {
    client: LookupClient,
    config: Arc<Config>,
}

#[derive(Debug, Default, Deserialize)]
struct LookupQuery {
    #[serde(default)]
    fresh: bool,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    uptime_seconds: u64,
    cached_results: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "rdap_service=info,tower_http=debug".into()),
        )
        .init();

    // Load configuration
    let config = Arc::new(Config::load()?);
    info!("Configuration loaded successfully");

    let client = LookupClient::new_with_config(config.clone()).await?;

    // Warm the registry so the first request does not pay for bootstrap
    if let Err(e) = client.services().await {
        warn!("Initial bootstrap load failed, will retry on demand: {}", e);
    }

    metrics::init_metrics();
    spawn_bootstrap_refresh(client.clone(), Duration::from_secs(config.bootstrap_ttl_seconds));

    let app_state = AppState {
        client,
        config: config.clone(),
    };

    let app = Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/version", get(version))
        .route("/metrics", get(metrics::metrics_handler))
        .route("/api/v1/services", get(services))
        .route("/api/v1/:targets", get(lookup))
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive())
                .into_inner(),
        )
        .with_state(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;

    info!("RDAP service listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("Metrics: http://{}/metrics", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal, gracefully shutting down...");
}

/// Periodically rebuilds the bootstrap registry. Failures keep the
/// previous snapshot in service.
fn spawn_bootstrap_refresh(client: LookupClient, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every.max(MIN_REFRESH_INTERVAL));
        // The first tick completes immediately and startup already loaded
        interval.tick().await;

        loop {
            interval.tick().await;
            match client.refresh_bootstrap().await {
                Ok(()) => info!("Bootstrap registry refreshed"),
                Err(e) => {
                    warn!("Scheduled bootstrap refresh failed: {}", e);
                    metrics::increment_errors(e.kind());
                }
            }
            if let Ok(count) = client.cached_results().await {
                metrics::set_cached_keys(count);
            }
        }
    });
}

async fn lookup(
    Path(targets): Path<String>,
    Query(params): Query<LookupQuery>,
    State(state): State<AppState>,
) -> Result<Json<BatchResponse>, LookupError> {
    let start_time = std::time::Instant::now();

    let batch = match state.client.lookup_batch(&targets, params.fresh).await {
        Ok(batch) => batch,
        Err(e) => {
            metrics::increment_errors(e.kind());
            return Err(e);
        }
    };

    for (_, result) in &batch.results {
        metrics::record_result(result);
    }
    metrics::record_query_time(start_time.elapsed().as_millis() as u64);

    Ok(Json(batch))
}

async fn services(State(state): State<AppState>) -> Result<Json<ServiceMap>, LookupError> {
    Ok(Json(state.client.services().await?))
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let cached_results = state.client.cached_results().await.unwrap_or_default();
    metrics::set_cached_keys(cached_results);

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.config.start_time.elapsed().as_secs(),
        cached_results,
    })
}

async fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

async fn index() -> &'static str {
    "Welcome to rdap-service"
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not Found.")
}
