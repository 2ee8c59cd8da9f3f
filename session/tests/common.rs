//! Common test utilities for session integration tests
//!
//! - Record store that can be switched offline mid-test
//! - Session manager over a temporary storage directory

#![allow(dead_code)]

use ajnabi_ledger::store::RecordStore;
use ajnabi_ledger::subscription::{ChannelSpec, Subscription};
use ajnabi_ledger::{tables, Filter, LedgerError, MemoryStore, Query};
use async_trait::async_trait;
use serde_json::{json, Value};
use session::{SessionConfig, SessionManager, Storage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

pub fn init_logger() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init()
        .ok();
}

#[derive(Default)]
pub struct SwitchableStore {
    pub inner: MemoryStore,
    offline: AtomicBool,
}

impl SwitchableStore {
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), LedgerError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(LedgerError::connection("record store unreachable"));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for SwitchableStore {
    async fn insert(&self, table: &str, record: Value) -> Result<Value, LedgerError> {
        self.check()?;
        self.inner.insert(table, record).await
    }

    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, LedgerError> {
        self.check()?;
        self.inner.select(table, query).await
    }

    async fn update(&self, table: &str, filter: &Filter, patch: Value) -> Result<Vec<Value>, LedgerError> {
        self.check()?;
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
        self.check()?;
        self.inner.compare_and_swap(table, id, field, expected, new).await
    }

    async fn subscribe(&self, channel: ChannelSpec) -> Result<Subscription, LedgerError> {
        self.check()?;
        self.inner.subscribe(channel).await
    }
}

/// Session manager over a temp directory and a switchable in-memory store
pub struct TestSession {
    pub temp_dir: TempDir,
    pub store: Arc<SwitchableStore>,
    pub manager: Arc<SessionManager>,
}

impl TestSession {
    pub fn new() -> anyhow::Result<Self> {
        init_logger();
        let temp_dir = TempDir::new()?;
        log::info!("📁 Test directory: {:?}", temp_dir.path());
        let store = Arc::new(SwitchableStore::default());
        let manager = Arc::new(Self::manager_over(&temp_dir, store.clone()));
        Ok(Self {
            temp_dir,
            store,
            manager,
        })
    }

    /// A second manager over the same directory and store (an app restart)
    pub fn restart(&self) -> SessionManager {
        Self::manager_over(&self.temp_dir, self.store.clone())
    }

    fn manager_over(temp_dir: &TempDir, store: Arc<SwitchableStore>) -> SessionManager {
        let config = SessionConfig {
            storage_dir: temp_dir.path().to_path_buf(),
            device_id: Some("test-device".to_string()),
            ..Default::default()
        };
        let storage = Storage::new_with_base_dir(config.storage_dir.clone());
        SessionManager::with_store(config, store, storage)
    }

    pub async fn seed_plan(&self, name: &str, duration_days: Option<u32>, price_inr: u32) -> Uuid {
        let id = Uuid::new_v4();
        self.store
            .inner
            .insert(
                tables::PLANS,
                json!({
                    "id": id,
                    "name": name,
                    "duration_days": duration_days,
                    "price_inr": price_inr,
                    "features": [],
                    "is_active": true,
                }),
            )
            .await
            .expect("seed plan");
        id
    }

    /// Remote balance as the ledger sees it
    pub async fn remote_coins(&self, id: Uuid) -> u64 {
        let rows = self
            .store
            .inner
            .select(tables::USERS, &Query::new().eq("id", json!(id)))
            .await
            .expect("select account");
        rows[0]["coins"].as_u64().expect("coins column")
    }
}
