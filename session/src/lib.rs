//! AjnabiCam session: the signed-in user's cached state
//!
//! # Architecture
//!
//! - **Storage**: file-backed key-value store holding the account/profile snapshot
//! - **Session State**: in-memory snapshot published on a watch channel and
//!   mirrored to storage in lockstep
//! - **Session Manager**: user actions (signup, coins, premium, profile) that
//!   combine the cache with the ledger backend
//! - **API**: axum routes exposing the manager to a local client

pub mod api;
pub mod config;
pub mod error;
pub mod manager;
pub mod state;
pub mod storage;

pub use config::SessionConfig;
pub use error::{SessionError, StorageError};
pub use manager::{CatalogView, SessionManager};
pub use state::{SessionSnapshot, SessionState};
pub use storage::Storage;
