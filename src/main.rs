use axum::{routing::get, routing::post, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use certgen::app_state::AppState;
use certgen::config::AppConfig;
use certgen::routes;
use certgen::services::queue::JobQueue;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing certgen API server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    // Register application metrics
    metrics::describe_counter!(
        "certificate_jobs_total",
        "Total certificate generation jobs submitted"
    );
    metrics::describe_counter!(
        "certificate_jobs_completed",
        "Total certificate generation jobs completed"
    );
    metrics::describe_counter!(
        "certificate_jobs_failed",
        "Total certificate generation jobs that failed"
    );
    metrics::describe_histogram!(
        "certificate_generation_seconds",
        "Time to process a certificate generation job"
    );
    metrics::describe_gauge!(
        "certificate_queue_depth",
        "Current number of pending jobs in the generation lane"
    );

    // Initialize Redis job queue
    tracing::info!("Connecting to Redis job queue");
    let queue =
        JobQueue::new(&config.redis_url, config.status_ttl_secs).expect("Failed to initialize job queue");

    let bind_addr = config.bind_addr.clone();

    // Create shared application state
    let state = AppState::new(config, queue);

    // Build API routes
    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route(
            "/api/v1/certificates",
            post(routes::certificates::submit_certificate),
        )
        .route(
            "/api/v1/certificates/{job_id}",
            get(routes::certificates::get_job_status),
        )
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(1024 * 1024)); // 1 MB limit

    tracing::info!("Starting certgen on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
