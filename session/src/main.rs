use anyhow::Context;
use session::api::server;
use session::{SessionConfig, SessionManager};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Pick up a local .env before reading any configuration
    dotenv::dotenv().ok();

    // Initialize logger (set RUST_LOG=debug for verbose output, RUST_LOG=info for normal)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = SessionConfig::from_env();
    log::info!("Starting AjnabiCam session service on {}", config.bind_address);

    let manager = Arc::new(SessionManager::new(config));
    server::start_server(manager)
        .await
        .context("session API server failed")?;
    Ok(())
}
