/// Record Store Mock Server
///
/// A lightweight stand-in for the hosted record store: row CRUD, conditional
/// writes and a polling change feed, all in memory.

use anyhow::{Context, Result};
use ajnabi_ledger::MemoryStore;
use record_store_mock::{run_server, SeedCatalog};
use std::env;
use std::sync::Arc;

#[derive(Debug)]
struct Config {
    // Server
    server_host: String,
    server_port: u16,

    // Catalog
    seed_file: Option<String>,
}

impl Config {
    fn from_env() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if present

        let server_host = env::var("SERVER_HOST")
            .unwrap_or_else(|_| "0.0.0.0".to_string());

        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "4000".to_string())
            .parse()
            .context("Invalid SERVER_PORT")?;

        let seed_file = env::var("SEED_FILE").ok();

        Ok(Self {
            server_host,
            server_port,
            seed_file,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .init();

    log::info!("Starting Record Store Mock Server...");

    // Load configuration
    let config = Config::from_env()
        .context("Failed to load configuration")?;

    log::info!("Server will listen on {}:{}", config.server_host, config.server_port);

    let catalog = match &config.seed_file {
        Some(path) => {
            log::info!("Seeding from {}", path);
            SeedCatalog::from_file(path)
        }
        None => SeedCatalog::bundled(),
    }
    .context("Failed to load seed catalog")?;

    let store = Arc::new(MemoryStore::new());
    catalog
        .apply(&store)
        .await
        .context("Failed to seed record store")?;

    // Run server
    run_server(store, config.server_host, config.server_port)
        .await
        .context("Server error")?;

    Ok(())
}
