//! Common test utilities for ledger integration tests
//!
//! Provides a record store wrapper with switchable faults:
//! - offline mode (every call fails with a connection error)
//! - failing inserts into one table
//! - interleaving (yield before every call so concurrent tasks overlap)
//! - starved conditional writes (every swap loses)

#![allow(dead_code)]

use ajnabi_ledger::store::RecordStore;
use ajnabi_ledger::subscription::{ChannelSpec, Subscription};
use ajnabi_ledger::{Account, Backend, Filter, LedgerError, MemoryStore, Query};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub fn init_logger() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init()
        .ok();
}

#[derive(Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    offline: AtomicBool,
    interleave: AtomicBool,
    starve_swaps: AtomicBool,
    failing_table: Mutex<Option<String>>,
    lost_swaps: AtomicUsize,
}

impl FaultyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn set_interleave(&self, interleave: bool) {
        self.interleave.store(interleave, Ordering::SeqCst);
    }

    pub fn set_starve_swaps(&self, starve: bool) {
        self.starve_swaps.store(starve, Ordering::SeqCst);
    }

    pub fn fail_inserts_into(&self, table: Option<&str>) {
        *self.failing_table.lock().unwrap() = table.map(str::to_string);
    }

    /// Conditional writes that lost to a concurrent writer
    pub fn lost_swaps(&self) -> usize {
        self.lost_swaps.load(Ordering::SeqCst)
    }

    async fn gate(&self) -> Result<(), LedgerError> {
        if self.interleave.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(LedgerError::connection("store offline"));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for FaultyStore {
    async fn insert(&self, table: &str, record: Value) -> Result<Value, LedgerError> {
        self.gate().await?;
        if self.failing_table.lock().unwrap().as_deref() == Some(table) {
            return Err(LedgerError::connection(format!("insert into {} dropped", table)));
        }
        self.inner.insert(table, record).await
    }

    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, LedgerError> {
        self.gate().await?;
        self.inner.select(table, query).await
    }

    async fn update(&self, table: &str, filter: &Filter, patch: Value) -> Result<Vec<Value>, LedgerError> {
        self.gate().await?;
        self.inner.update(table, filter, patch).await
    }

    async fn compare_and_swap(
        &self,
        table: &str,
        id: Uuid,
        field: &str,
        expected: Value,
        new: Value,
    ) -> Result<bool, LedgerError> {
        self.gate().await?;
        if self.starve_swaps.load(Ordering::SeqCst) {
            self.lost_swaps.fetch_add(1, Ordering::SeqCst);
            return Ok(false);
        }
        let swapped = self
            .inner
            .compare_and_swap(table, id, field, expected, new)
            .await?;
        if !swapped {
            self.lost_swaps.fetch_add(1, Ordering::SeqCst);
        }
        Ok(swapped)
    }

    async fn subscribe(&self, channel: ChannelSpec) -> Result<Subscription, LedgerError> {
        self.gate().await?;
        self.inner.subscribe(channel).await
    }
}

/// Backend wired to a fault-injectable in-memory store
pub struct TestBackend {
    pub store: Arc<FaultyStore>,
    pub backend: Backend,
}

impl TestBackend {
    pub fn new() -> Self {
        init_logger();
        let store = FaultyStore::new();
        let backend = Backend::new(store.clone());
        Self { store, backend }
    }

    /// Account whose whole balance came from the signup bonus
    pub async fn account_with(&self, coins: u64) -> Account {
        let account = self
            .backend
            .accounts
            .create_account(None, Some("test-device"), coins)
            .await
            .expect("create account");
        assert_eq!(account.coins, coins);
        account
    }
}
