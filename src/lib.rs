//! AjnabiCam ledger: coin balances and account records over a hosted store
//!
//! This crate is the client side of the AjnabiCam backend. Persistence,
//! matching data and real-time updates live in a hosted record store; this
//! crate reads and writes it.
//!
//! # Architecture
//!
//! - **Record Store**: table-addressed row CRUD with conditional writes and
//!   change subscriptions (`MemoryStore` in-process, `HttpStore` remote)
//! - **Ledger Service**: credit/debit with an append-only entry per mutation
//! - **Accounts / Catalog / Payments / Calls**: typed access to the other tables
//!
//! # Example
//!
//! ```ignore
//! use ajnabi_ledger::{Backend, EntryCategory, MemoryStore};
//! use std::sync::Arc;
//!
//! let backend = Backend::new(Arc::new(MemoryStore::new()));
//! let account = backend.accounts.create_account(None, None, 100).await?;
//!
//! backend
//!     .ledger
//!     .debit(account.id, 5, EntryCategory::Reconnect, "Reconnected with a match")
//!     .await?;
//! let latest = backend.ledger.list_entries(account.id, 1).await?;
//! ```

// Public modules
pub mod accounts;
pub mod backend;
pub mod calls;
pub mod catalog;
pub mod error;
pub mod ledger;
pub mod models;
pub mod payments;
pub mod store;
pub mod subscription;

// Re-exports for convenience
pub use accounts::Accounts;
pub use backend::Backend;
pub use calls::Calls;
pub use catalog::Catalog;
pub use error::LedgerError;
pub use ledger::{LedgerAudit, LedgerService, DEFAULT_ENTRY_LIMIT, DEFAULT_MAX_CONFLICT_RETRIES};
pub use models::*;
pub use payments::Payments;
pub use store::{tables, Direction, Filter, HttpStore, MemoryStore, Query, RecordStore};
pub use subscription::{ChangeEvent, ChangeKind, ChannelSpec, Listener, Subscription};

// Common result type
pub type Result<T> = std::result::Result<T, LedgerError>;
