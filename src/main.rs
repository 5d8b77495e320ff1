use axum::{
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

mod config;
mod db;
mod error;
mod handlers;
mod ledger;
mod models;
mod workflow;

use crate::config::Config;

/// Shared application state — cheap to clone (pool is Arc-backed).
#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (ignored in production where env vars are injected)
    dotenv::dotenv().ok();

    // Structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,warranty_service=debug".parse().unwrap()),
        )
        .with_target(false)
        .compact()
        .init();

    let config = Config::from_env()?;

    info!("Warranty Service — returns, inspections, dispositions");

    info!("Connecting to PostgreSQL...");
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;
    info!("Database connection pool established.");

    info!("Running migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations complete.");

    let state = AppState { db: pool };
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: AppState) -> Router {
    Router::new()
        // ── Health ──────────────────────────────────────────────────────────
        .route("/health", get(handlers::health))

        // ── Warranties ──────────────────────────────────────────────────────
        .route(
            "/api/v1/warranties",
            get(handlers::warranties::list_warranties)
                .post(handlers::warranties::create_warranty),
        )
        .route(
            "/api/v1/warranties/:id",
            get(handlers::warranties::get_warranty),
        )
        .route(
            "/api/v1/warranties/:id/inspection",
            post(handlers::warranties::submit_inspection),
        )
        .route(
            "/api/v1/warranties/:id/decision",
            post(handlers::warranties::confirm_decision),
        )
        // Legacy fused inspection+decision+stock call
        .route(
            "/api/v1/warranties/:id/process",
            post(handlers::warranties::process_legacy),
        )
        .route(
            "/api/v1/warranties/:id/start-review",
            post(handlers::warranties::start_review),
        )
        .route(
            "/api/v1/warranties/:id/complete-repair",
            post(handlers::warranties::complete_repair),
        )
        .route(
            "/api/v1/warranties/:id/cancel",
            post(handlers::warranties::cancel),
        )

        // ── Middleware ──────────────────────────────────────────────────────
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
