use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

// API Routes - REST API for programmatic access
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new().nest(
        "/api",
        Router::new()
            // Query generation
            .route("/query", post(handlers::api::generate_query))
            // Catalog inspection
            .route("/tables", get(handlers::api::list_tables))
            .route("/tables/{table}", get(handlers::api::describe_table))
            // System status
            .route("/status", get(handlers::api::system_status)),
    )
}
