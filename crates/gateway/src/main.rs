//! Quarry API Gateway
//!
//! The entry point for all external API requests. Handles:
//! - Upload intake and validation
//! - Document status, content, and knowledge retrieval
//! - Request routing and rate limiting
//! - Observability (logging, metrics, tracing)
//!
//! The extraction worker pool runs in-process: uploads enqueue jobs over a
//! bounded channel and return as soon as the document row is durable.

mod handlers;
mod middleware;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use quarry_common::{
    config::AppConfig,
    db::{DbPool, Repository},
    metrics,
    storage::BlobStore,
    VERSION,
};
use quarry_extractor::{
    ocr::TesseractEngine,
    video::{FrameConfig, FrameSampler},
    ExtractionPipeline, ExtractionPool, JobQueue,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub storage: BlobStore,
    pub jobs: JobQueue,
}

impl AppState {
    pub fn repository(&self) -> Repository {
        Repository::new(self.db.clone())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Arc::new(AppConfig::load()?);

    // Initialize tracing
    init_tracing(&config.observability);

    info!("Starting Quarry API Gateway v{}", VERSION);

    // Initialize metrics
    metrics::register_metrics();
    if config.observability.metrics_port != 0 {
        let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .set_buckets_for_metric(
                Matcher::Full(format!("{}_request_duration_seconds", metrics::METRICS_PREFIX)),
                metrics::LATENCY_BUCKETS,
            )?
            .set_buckets_for_metric(
                Matcher::Full(format!(
                    "{}_extraction_duration_seconds",
                    metrics::METRICS_PREFIX
                )),
                metrics::EXTRACTION_BUCKETS,
            )?
            .install()?;
        info!("Prometheus exporter listening on {}", metrics_addr);
    }

    // Initialize database connection and schema
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    db.migrate().await?;

    // Initialize blob storage
    let storage = BlobStore::new(config.storage.root.clone());
    storage.init().await?;

    // Start the extraction worker pool
    let pipeline = Arc::new(ExtractionPipeline::new(
        Repository::new(db.clone()),
        storage.clone(),
        Arc::new(TesseractEngine::new(&config.ocr)),
        FrameSampler::new(FrameConfig::from(&config.video)),
        config.clone(),
    ));
    let (jobs, pool) = ExtractionPool::start(
        pipeline,
        config.extraction.workers,
        config.extraction.queue_depth,
    );

    // Create app state
    let state = AppState {
        config: config.clone(),
        db,
        storage,
        jobs,
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router (and with it the last queue handle) is gone; let the
    // dispatcher drain before exiting
    info!("Draining extraction pool...");
    pool.join().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // Uploads dominate body size; leave headroom for multipart framing
    let body_limit = DefaultBodyLimit::max(state.config.limits.max_video_bytes + 4 * 1024 * 1024);

    // API routes
    let api_routes = Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        // Document endpoints
        .route("/documents/upload", post(handlers::documents::upload_document))
        .route("/documents", get(handlers::documents::list_documents))
        .route(
            "/documents/{id}",
            get(handlers::documents::get_document)
                .patch(handlers::documents::patch_document)
                .delete(handlers::documents::delete_document),
        )
        .route("/documents/{id}/content", get(handlers::documents::get_content))
        .route("/documents/{id}/entities", get(handlers::documents::get_entities))
        .route(
            "/documents/{id}/categories",
            get(handlers::documents::get_categories),
        )
        // Image endpoints
        .route("/images/upload", post(handlers::images::upload_image))
        // Video endpoints
        .route("/videos/upload", post(handlers::videos::upload_video))
        .route("/videos/{id}/frame/{index}", get(handlers::videos::get_frame))
        // Knowledge endpoints
        .route("/knowledge/search", post(handlers::knowledge::search))
        .route("/knowledge/stats", get(handlers::knowledge::stats));

    // Compose the app
    let mut app = Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .layer(body_limit);

    if state.config.rate_limit.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(
            state.config.rate_limit.requests_per_second,
            state.config.rate_limit.burst,
        );
        app = app.layer(axum::middleware::from_fn(move |request, next| {
            let limiter = limiter.clone();
            async move {
                middleware::rate_limit::rate_limit_middleware(request, next, limiter).await
            }
        }));
    }

    app.with_state(state)
}

/// Initialize the tracing subscriber from the observability config.
/// RUST_LOG takes precedence over the configured log level.
fn init_tracing(config: &quarry_common::config::ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
