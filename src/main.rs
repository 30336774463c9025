//! Loanbook Backend Server
//!
//! Chat-adapter-facing API for a small loan ledger: borrower registration,
//! installment loans, payment-count adjustments, and search, gated behind a
//! shared operator password with rate limiting and automatic ban escalation.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderValue, Method};
use axum::{routing::get, Router};
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};

use loanbook_server::config::Config;
use loanbook_server::db;
use loanbook_server::middleware::{
    hsts_header, request_tracing, security_headers, AuthGuard, BanGuard, Gate, Guard,
    RateLimitGuard, RateLimiter,
};
use loanbook_server::routes;
use loanbook_server::services::{AccessService, BanService, LoanService};
use loanbook_server::state::AppState;

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

    tracing::info!(
        environment = config.environment.as_str(),
        "Starting Loanbook server"
    );

    // Initialize database connection pool and schema
    let pool = match db::create_pool(&config).await {
        Ok(p) => p,
        Err(e) => {
            tracing::error!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = db::run_migrations(&pool).await {
        tracing::error!("Failed to run migrations: {}", e);
        std::process::exit(1);
    }

    // Initialize services
    let loan_service = Arc::new(LoanService::new(pool.clone()));
    let access_service = Arc::new(AccessService::new(pool.clone()));
    let ban_service = Arc::new(BanService::new(pool.clone()));

    // The rate limiter lives for the whole process; its state resets on
    // restart by design.
    let limiter = Arc::new(RateLimiter::new());

    let ban_guard = Arc::new(BanGuard::new(ban_service.clone()));
    let rate_guard = Arc::new(RateLimitGuard::new(
        limiter.clone(),
        access_service.clone(),
        ban_service.clone(),
        config.rate_limit_max_attempts,
        config.rate_limit_window,
        config.rate_limit_ban_after,
    ));
    let auth_guard = Arc::new(AuthGuard::new(access_service.clone()));

    // Full pipeline for loan and admin actions; the password endpoint runs
    // without the authorization guard.
    let guards: Vec<Arc<dyn Guard>> =
        vec![ban_guard.clone(), rate_guard.clone(), auth_guard];
    let gate = Arc::new(Gate::new(guards, limiter.clone()));

    let public_guards: Vec<Arc<dyn Guard>> = vec![ban_guard, rate_guard];
    let auth_gate = Arc::new(Gate::new(public_guards, limiter.clone()));

    // Keep the rate limiter map bounded in a long-lived process.
    let cleanup_limiter = limiter.clone();
    let cleanup_window = config.rate_limit_window;
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(300));
        loop {
            tick.tick().await;
            cleanup_limiter.cleanup(cleanup_window).await;
        }
    });

    let config = Arc::new(config);

    // Create shared app state
    let state = AppState::new(
        config.clone(),
        loan_service,
        access_service,
        ban_service,
        gate,
        auth_gate,
    );

    // Clone pool for health check
    let health_pool = pool.clone();

    // Create the app router
    let mut app = Router::new()
        .route("/", get(root))
        .route("/health", get(move || health_check(health_pool.clone())))
        .merge(routes::access_routes())
        .merge(routes::loan_routes())
        .with_state(state)
        .layer(axum::middleware::from_fn(security_headers))
        .layer(axum::middleware::from_fn(request_tracing))
        .layer(configure_cors(config.cors_allowed_origins.as_deref()));

    if config.environment.is_production() {
        app = app.layer(axum::middleware::from_fn(hsts_header));
    }

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check at http://{}/health", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    // Serve with graceful shutdown
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {}", e);
    }

    tracing::info!("Server shutdown complete");
}

async fn root() -> &'static str {
    "Loanbook API Server"
}

/// Health check response
#[derive(serde::Serialize)]
struct HealthResponse {
    status: String,
    database: String,
    version: String,
}

/// Health check endpoint
async fn health_check(pool: sqlx::SqlitePool) -> axum::Json<HealthResponse> {
    let db_status = match db::check_health(&pool).await {
        Ok(()) => "connected".to_string(),
        Err(e) => format!("error: {}", e),
    };

    let status = if db_status == "connected" {
        "healthy"
    } else {
        "unhealthy"
    };

    axum::Json(HealthResponse {
        status: status.to_string(),
        database: db_status,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn configure_cors(allowed_origins: Option<&str>) -> CorsLayer {
    let Some(allowed) = allowed_origins.filter(|s| !s.is_empty()) else {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (permissive)");
        return CorsLayer::permissive();
    };

    let origins: Vec<HeaderValue> = allowed
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
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
