/// Record Store Mock Server Library
///
/// This crate provides both a standalone binary and library components
/// for serving an in-memory record store over HTTP.

pub mod handlers;
pub mod seed;
pub mod server;

// Re-export commonly used types
pub use handlers::ApiError;
pub use seed::{SeedCatalog, SeedError, SeedSummary};
pub use server::{create_router, run_server};
