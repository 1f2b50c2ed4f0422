//! PrestAmigo Backend Server
//!
//! Rust backend for the PrestAmigo peer-to-peer lending app: loans to
//! registered contacts, installment schedules, payment-proof review, and
//! the lender's capital pool.

use axum::http::{HeaderValue, Method};
use axum::{extract::State, routing::get, Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};

use prestamigo_server::capital_service::CapitalService;
use prestamigo_server::config::Config;
use prestamigo_server::db;
use prestamigo_server::loan_service::LoanService;
use prestamigo_server::middleware;
use prestamigo_server::notifier::{reminder_loop, Notifier};
use prestamigo_server::profile::ProfileDirectory;
use prestamigo_server::proof_service::ProofService;
use prestamigo_server::routes;
use prestamigo_server::state::AppState;
use prestamigo_server::storage::StorageClient;

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(true)
        .init();

    tracing::info!(environment = config.environment.as_str(), "Starting PrestAmigo backend");

    // Database pool and migrations
    let db_pool = match db::create_pool(&config).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = db::run_migrations(&db_pool).await {
        tracing::error!("Failed to run migrations: {}", e);
        std::process::exit(1);
    }

    // Collaborators
    let directory = ProfileDirectory::new(db_pool.clone());
    let storage = StorageClient::new(
        config.storage_url.clone(),
        config.storage_service_key.clone(),
        config.storage_bucket.clone(),
    );
    let notifier = Arc::new(Notifier::new(
        config.push_gateway_url.clone(),
        directory.clone(),
    ));

    // Domain services
    let capital_service = Arc::new(CapitalService::new(db_pool.clone()));
    let loan_service = Arc::new(LoanService::new(
        db_pool.clone(),
        directory.clone(),
        notifier.clone(),
    ));
    let proof_service = Arc::new(ProofService::new(
        db_pool.clone(),
        storage,
        notifier.clone(),
    ));

    let app_state = AppState::new(
        db_pool.clone(),
        loan_service,
        capital_service,
        proof_service,
        directory,
    );

    // Due-date reminder loop in the background
    let reminder_pool = db_pool.clone();
    let reminder_notifier = notifier.clone();
    let reminder_interval = config.reminder_interval_seconds;
    tokio::spawn(async move {
        tracing::info!("Due-date reminder task started");
        reminder_loop(reminder_pool, reminder_notifier, reminder_interval).await;
    });

    // Create the app router
    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .merge(routes::loan_routes())
        .merge(routes::capital_routes())
        .merge(routes::proof_routes())
        .merge(routes::profile_routes())
        .with_state(app_state)
        .layer(axum::middleware::from_fn(middleware::request_tracing))
        .layer(configure_cors(config.cors_allowed_origins.as_deref()));

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check at http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind server address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Server shutdown complete");
}

async fn root() -> &'static str {
    "PrestAmigo API Server"
}

/// Health check response
#[derive(serde::Serialize)]
struct HealthResponse {
    status: String,
    database: String,
    version: String,
}

/// Health check endpoint
async fn health_check(State(app_state): State<AppState>) -> Json<HealthResponse> {
    let db_status = match db::check_health(&app_state.db_pool).await {
        Ok(()) => "connected".to_string(),
        Err(e) => format!("error: {}", e),
    };

    let status = if db_status == "connected" {
        "healthy"
    } else {
        "unhealthy"
    };

    Json(HealthResponse {
        status: status.to_string(),
        database: db_status,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn configure_cors(allowed_origins: Option<&str>) -> CorsLayer {
    let Some(allowed_origins) = allowed_origins.filter(|s| !s.is_empty()) else {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (permissive)");
        return CorsLayer::permissive();
    };

    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers(Any)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
