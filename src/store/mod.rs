//! Record store abstraction
//!
//! - `RecordStore` trait: row CRUD by table name, conditional writes, subscriptions
//! - `MemoryStore`: in-process implementation
//! - `HttpStore`: client for a store served over HTTP
//! - Typed helpers converting rows to model types

mod http;
mod memory;
mod query;
pub mod wire;

pub use http::HttpStore;
pub use memory::MemoryStore;
pub use query::{compare_values, Direction, Filter, Op, Order, Predicate, Query};

use crate::error::LedgerError;
use crate::subscription::{ChannelSpec, Subscription};
use crate::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Table names of the hosted store
pub mod tables {
    pub const USERS: &str = "users";
    pub const PROFILES: &str = "user_profiles";
    pub const LEDGER: &str = "coin_transactions";
    pub const CALLS: &str = "video_calls";
    pub const MATCHES: &str = "matches";
    pub const PLANS: &str = "premium_plans";
    pub const PACKS: &str = "coin_packs";
    pub const ORDERS: &str = "payment_orders";
    pub const APP_CONFIG: &str = "app_config";
}

/// Hosted relational-record store
///
/// Rows are JSON objects carrying an `id`. Every call is a separate remote
/// round trip; there is no multi-statement transaction.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a row, returning it as stored (with `id`/`created_at` filled in)
    async fn insert(&self, table: &str, record: Value) -> Result<Value>;

    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>>;

    /// Shallow-merge `patch` into every matching row, returning updated rows
    async fn update(&self, table: &str, filter: &Filter, patch: Value) -> Result<Vec<Value>>;

    /// Set `field` to `new` only if it currently equals `expected`
    ///
    /// Returns `false` when another writer changed the field first.
    async fn compare_and_swap(
        &self,
        table: &str,
        id: Uuid,
        field: &str,
        expected: Value,
        new: Value,
    ) -> Result<bool>;

    async fn subscribe(&self, channel: ChannelSpec) -> Result<Subscription>;
}

// ============================================================================
// Typed helpers
// ============================================================================

pub(crate) async fn insert_record<T>(store: &dyn RecordStore, table: &str, record: &T) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    let stored = store.insert(table, serde_json::to_value(record)?).await?;
    Ok(serde_json::from_value(stored)?)
}

pub(crate) async fn fetch_all<T: DeserializeOwned>(
    store: &dyn RecordStore,
    table: &str,
    query: &Query,
) -> Result<Vec<T>> {
    store
        .select(table, query)
        .await?
        .into_iter()
        .map(|row| serde_json::from_value(row).map_err(LedgerError::from))
        .collect()
}

/// First row matching `query`, or `NotFound` keyed by `key`
pub(crate) async fn fetch_one<T: DeserializeOwned>(
    store: &dyn RecordStore,
    table: &str,
    query: Query,
    key: impl std::fmt::Display,
) -> Result<T> {
    let row = store
        .select(table, &query.limit(1))
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| LedgerError::not_found(table, key))?;
    Ok(serde_json::from_value(row)?)
}

/// Update exactly the rows matching `filter` and return the first one
pub(crate) async fn update_one<T: DeserializeOwned>(
    store: &dyn RecordStore,
    table: &str,
    filter: &Filter,
    patch: Value,
    key: impl std::fmt::Display,
) -> Result<T> {
    let row = store
        .update(table, filter, patch)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| LedgerError::not_found(table, key))?;
    Ok(serde_json::from_value(row)?)
}
