use axum::{
    http::HeaderValue,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use super::handlers;
use crate::manager::SessionManager;

/// Build the session API router over a shared manager
pub fn create_router(manager: Arc<SessionManager>) -> Router {
    Router::new()
        // Session routes
        .route("/api/session", get(handlers::get_session_handler))
        .route("/api/session/load", post(handlers::load_session_handler))
        .route("/api/session/signup", post(handlers::signup_handler))
        .route("/api/session/sign-out", post(handlers::sign_out_handler))
        .route("/api/profile", put(handlers::update_profile_handler))
        // Coin routes
        .route("/api/coins/spend", post(handlers::spend_coins_handler))
        .route("/api/coins/add", post(handlers::add_coins_handler))
        .route("/api/coins/reward", post(handlers::claim_reward_handler))
        .route(
            "/api/coins/transactions",
            get(handlers::transactions_handler),
        )
        // Premium & catalog routes
        .route("/api/premium/status", get(handlers::premium_status_handler))
        .route(
            "/api/premium/activate",
            post(handlers::activate_premium_handler),
        )
        .route("/api/catalog", get(handlers::catalog_handler))
        .layer(cors_layer())
        .with_state(manager)
}

pub async fn start_server(manager: Arc<SessionManager>) -> anyhow::Result<()> {
    let addr = manager.config.bind_address.clone();

    if manager.load().await.is_some() {
        manager.watch_account().await;
    }

    let app = create_router(manager.clone());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    manager.stop_watching();
    Ok(())
}

/// Configure CORS based on environment
///
/// Set ALLOWED_ORIGINS="https://app.example,https://preview.example" to restrict
/// origins; unset allows any origin (development mode).
fn cors_layer() -> CorsLayer {
    match std::env::var("ALLOWED_ORIGINS") {
        Ok(origins) if !origins.is_empty() => {
            log::info!("CORS configured for origins: {}", origins);
            let origin_list: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| match s.trim().parse() {
                    Ok(origin) => Some(origin),
                    Err(_) => {
                        log::warn!("Ignoring invalid CORS origin '{}'", s.trim());
                        None
                    }
                })
                .collect();
            CorsLayer::new()
                .allow_origin(origin_list)
                .allow_methods(Any)
                .allow_headers(Any)
        }
        _ => {
            log::warn!("CORS: Allowing all origins (development mode). Set ALLOWED_ORIGINS env var for production.");
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }
}

/// Handle graceful shutdown signals (Ctrl+C, SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            log::info!("Received SIGTERM signal");
        },
    }

    log::info!("Shutdown signal received, exiting gracefully...");
}
