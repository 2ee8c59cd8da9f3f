/// Axum HTTP server setup and routing

use ajnabi_ledger::MemoryStore;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::*;

pub fn create_router(store: Arc<MemoryStore>) -> Router {
    // Configure CORS to allow requests from local clients/tests
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health_check))

        // Row endpoints
        .route("/rest/:table", post(insert_row).patch(update_rows))
        .route("/rest/:table/query", post(select_rows))
        .route("/rest/:table/:id/cas", post(compare_and_swap))

        // Change feed
        .route("/changes", get(get_changes))

        // Shared state
        .with_state(store)

        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn run_server(store: Arc<MemoryStore>, host: String, port: u16) -> anyhow::Result<()> {
    let app = create_router(store);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    log::info!("🚀 Record store mock listening on http://{}", addr);
    log::info!("📡 Change feed: GET /changes?after=<seq>");

    axum::serve(listener, app).await?;

    Ok(())
}
