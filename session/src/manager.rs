/// Session Manager - Orchestration Layer
///
/// Runs user actions against the session cache and the backend. Actions never
/// return structured errors: failures are logged, recorded as a single message
/// in the session snapshot, and reported as `false`/`None`.
///
/// Coin actions are optimistic. The cached balance moves first, the ledger
/// write follows, and a failed write is undone with the inverse local delta.
use ajnabi_ledger::{
    Account, AppConfig, Backend, CoinPack, EntryCategory, HttpStore, LedgerEntry, LedgerError,
    LedgerService, PremiumPlan, Profile, ProfileUpdate, RecordStore, Subscription,
};
use chrono::Utc;
use futures::StreamExt;
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::state::{SessionSnapshot, SessionState};
use crate::storage::Storage;

pub const COIN_TRANSACTION_FAILED: &str = "Coin transaction failed";

/// Everything the purchase screens need in one read
#[derive(Debug, Clone, Serialize)]
pub struct CatalogView {
    pub premium_plans: Vec<PremiumPlan>,
    pub coin_packs: Vec<CoinPack>,
    pub app_config: AppConfig,
}

pub struct SessionManager {
    pub config: SessionConfig,
    state: SessionState,
    backend: Backend,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl SessionManager {
    // ============================================================================
    // Constructor
    // ============================================================================

    pub fn new(config: SessionConfig) -> Self {
        let store = Arc::new(HttpStore::new(config.record_store_url.clone()));
        let storage = Storage::new_with_base_dir(config.storage_dir.clone());
        Self::with_store(config, store, storage)
    }

    /// Create SessionManager over any record store (for testing)
    pub fn with_store(config: SessionConfig, store: Arc<dyn RecordStore>, storage: Storage) -> Self {
        let ledger =
            LedgerService::new(store.clone()).with_max_conflict_retries(config.max_conflict_retries);
        Self {
            config,
            state: SessionState::new(storage),
            backend: Backend::with_ledger(store, ledger),
            watcher: Mutex::new(None),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    // ============================================================================
    // Session lifecycle
    // ============================================================================

    /// Publish the persisted snapshot, then replace it with the remote records
    ///
    /// Remote failures keep the persisted copy. Nothing here is fatal: with no
    /// snapshot and no store the session simply has no account.
    pub async fn load(&self) -> Option<Account> {
        self.state.set_loading(true);
        let (account, profile) = self.state.restore();

        if let Some(cached) = account {
            match self.backend.accounts.get_account(cached.id).await {
                Ok(fresh) => self.persist_account(Some(fresh)),
                Err(e) => log::warn!("Keeping cached account {}: {}", cached.id, e),
            }
        }

        if let Some(cached) = profile {
            match self.backend.accounts.get_profile(cached.user_id).await {
                Ok(fresh) => self.persist_profile(Some(fresh)),
                Err(e) => log::warn!("Keeping cached profile of {}: {}", cached.user_id, e),
            }
        }

        self.state.set_loading(false);
        self.state.account()
    }

    pub async fn create_account(&self, phone_number: Option<&str>) -> Option<Account> {
        self.run("Failed to create account", async {
            let config = self.app_config().await;
            let account = self
                .backend
                .accounts
                .create_account(
                    phone_number,
                    self.config.device_id.as_deref(),
                    config.free_signup_coins,
                )
                .await?;
            self.persist_account(Some(account.clone()));
            Ok(account)
        })
        .await
    }

    /// Forget the session locally; the remote account is untouched
    pub async fn sign_out(&self) {
        self.stop_watching();
        if let Err(e) = self.state.clear() {
            log::error!("Failed to clear session storage: {}", e);
        }
        log::info!("Signed out");
    }

    // ============================================================================
    // Profile
    // ============================================================================

    /// Update the profile, creating it on first use
    pub async fn update_profile(&self, update: ProfileUpdate) -> Option<Profile> {
        self.run("Failed to update profile", async {
            let account = self.require_account()?;
            let accounts = &self.backend.accounts;
            let profile = match accounts.update_profile(account.id, &update).await {
                Err(LedgerError::NotFound { .. }) => accounts.create_profile(account.id, &update).await?,
                other => other?,
            };
            self.persist_profile(Some(profile.clone()));
            Ok(profile)
        })
        .await
    }

    pub async fn touch_last_active(&self) -> bool {
        let Some(account) = self.state.account() else {
            return false;
        };
        match self.backend.accounts.touch_last_active(account.id).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to update last active for {}: {}", account.id, e);
                false
            }
        }
    }

    // ============================================================================
    // Coins
    // ============================================================================

    /// Spend coins; refused locally when the cached balance is too low
    pub async fn spend_coins(&self, amount: u64, category: EntryCategory, description: &str) -> bool {
        self.run(COIN_TRANSACTION_FAILED, self.spend(amount, category, description))
            .await
            .is_some()
    }

    pub async fn add_coins(&self, amount: u64, category: EntryCategory, description: &str) -> bool {
        self.run(COIN_TRANSACTION_FAILED, self.earn(amount, category, description))
            .await
            .is_some()
    }

    pub async fn claim_ad_reward(&self) -> bool {
        let config = self.app_config().await;
        self.add_coins(config.rewarded_ad_coins, EntryCategory::Reward, "Watched rewarded ad")
            .await
    }

    pub async fn unlock_profile(&self) -> bool {
        let config = self.app_config().await;
        self.spend_coins(
            config.unlock_profile_cost,
            EntryCategory::UnlockProfile,
            "Unlocked profile",
        )
        .await
    }

    pub async fn reconnect(&self) -> bool {
        let config = self.app_config().await;
        self.spend_coins(
            config.reconnect_cost,
            EntryCategory::Reconnect,
            "Reconnected with a match",
        )
        .await
    }

    pub async fn boost(&self) -> bool {
        let config = self.app_config().await;
        let description = format!("Profile boost for {} hour(s)", config.boost_duration_hours);
        self.spend_coins(config.boost_cost, EntryCategory::Boost, &description)
            .await
    }

    /// Newest-first ledger history; empty when it cannot be read
    pub async fn transactions(&self, limit: usize) -> Vec<LedgerEntry> {
        let Some(account) = self.state.account() else {
            return Vec::new();
        };
        match self.backend.ledger.list_entries(account.id, limit).await {
            Ok(entries) => entries,
            Err(e) => {
                log::error!("Failed to list transactions for {}: {}", account.id, e);
                Vec::new()
            }
        }
    }

    async fn spend(&self, amount: u64, category: EntryCategory, description: &str) -> Result<u64, SessionError> {
        let account = self.require_account()?;
        if account.coins < amount {
            return Err(SessionError::InsufficientFunds {
                balance: account.coins,
                requested: amount,
            });
        }
        let delta = signed(amount)?;

        let optimistic = self.apply_local(-delta);
        if let Err(e) = self
            .backend
            .ledger
            .debit(account.id, amount, category, description)
            .await
        {
            self.apply_local(delta);
            return Err(e.into());
        }
        Ok(optimistic)
    }

    async fn earn(&self, amount: u64, category: EntryCategory, description: &str) -> Result<u64, SessionError> {
        let account = self.require_account()?;
        let delta = signed(amount)?;

        let optimistic = self.apply_local(delta);
        if let Err(e) = self
            .backend
            .ledger
            .credit(account.id, amount, category, description)
            .await
        {
            self.apply_local(-delta);
            return Err(e.into());
        }
        Ok(optimistic)
    }

    fn apply_local(&self, delta: i64) -> u64 {
        match self.state.apply_delta(delta) {
            Ok(balance) => balance.unwrap_or_default(),
            Err(e) => {
                log::error!("Failed to persist balance change: {}", e);
                self.state.account().map(|a| a.coins).unwrap_or_default()
            }
        }
    }

    // ============================================================================
    // Premium
    // ============================================================================

    /// True while premium is in effect; demotes a lapsed plan locally
    pub fn check_premium_status(&self) -> bool {
        match self.state.check_premium_expiry(Utc::now()) {
            Ok(active) => active,
            Err(e) => {
                log::error!("Failed to persist premium expiry: {}", e);
                false
            }
        }
    }

    pub async fn activate_premium(&self, plan_id: Uuid) -> bool {
        self.run("Failed to activate premium", async {
            let account = self.require_account()?;
            let upgraded = self
                .backend
                .accounts
                .activate_premium(account.id, plan_id)
                .await?;
            self.persist_account(Some(upgraded));
            Ok(())
        })
        .await
        .is_some()
    }

    // ============================================================================
    // Catalog
    // ============================================================================

    pub async fn catalog(&self) -> Result<CatalogView, SessionError> {
        let catalog = &self.backend.catalog;
        Ok(CatalogView {
            premium_plans: catalog.premium_plans().await?,
            coin_packs: catalog.coin_packs().await?,
            app_config: catalog.app_config().await?,
        })
    }

    async fn app_config(&self) -> AppConfig {
        self.backend.catalog.app_config().await.unwrap_or_else(|e| {
            log::warn!("Using default app config: {}", e);
            AppConfig::default()
        })
    }

    // ============================================================================
    // Remote updates
    // ============================================================================

    /// Mirror remote changes of the signed-in account into the cache
    ///
    /// Replaces any earlier watch. Stops on `stop_watching` or sign-out.
    pub async fn watch_account(&self) -> bool {
        let Some(account) = self.state.account() else {
            return false;
        };
        let subscription = match self.backend.accounts.subscribe_to_account(account.id).await {
            Ok(subscription) => subscription,
            Err(e) => {
                log::error!("Failed to watch account {}: {}", account.id, e);
                return false;
            }
        };

        let task = tokio::spawn(republish(subscription, self.state.clone()));
        let previous = self
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
        log::info!("Watching account {}", account.id);
        true
    }

    pub fn stop_watching(&self) {
        let task = self
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
            log::debug!("Stopped watching account");
        }
    }

    // ============================================================================
    // Helpers
    // ============================================================================

    /// Run an action with the loading flag raised; failures become `None`
    async fn run<T>(
        &self,
        failure: &str,
        action: impl std::future::Future<Output = Result<T, SessionError>>,
    ) -> Option<T> {
        self.state.set_loading(true);
        self.state.clear_error();
        let result = action.await;
        self.state.set_loading(false);

        match result {
            Ok(value) => Some(value),
            Err(e) => {
                log::error!("{}: {}", failure, e);
                self.state.set_error(e.user_message(failure));
                None
            }
        }
    }

    fn require_account(&self) -> Result<Account, SessionError> {
        self.state.account().ok_or(SessionError::NoAccount)
    }

    fn persist_account(&self, account: Option<Account>) {
        if let Err(e) = self.state.set_account(account) {
            log::error!("Failed to persist account: {}", e);
        }
    }

    fn persist_profile(&self, profile: Option<Profile>) {
        if let Err(e) = self.state.set_profile(profile) {
            log::error!("Failed to persist profile: {}", e);
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.stop_watching();
    }
}

async fn republish(mut subscription: Subscription, state: SessionState) {
    while let Some(event) = subscription.next().await {
        let account: Account = match serde_json::from_value(event.record) {
            Ok(account) => account,
            Err(e) => {
                log::warn!("Ignoring malformed account update: {}", e);
                continue;
            }
        };
        // a late event must not resurrect a signed-out session
        if state.account().map(|a| a.id) != Some(account.id) {
            break;
        }
        log::debug!("Remote update for {}: {} coins", account.id, account.coins);
        if let Err(e) = state.set_account(Some(account)) {
            log::error!("Failed to persist remote account update: {}", e);
        }
    }
}

fn signed(amount: u64) -> Result<i64, SessionError> {
    i64::try_from(amount).map_err(|_| SessionError::InvalidInput(format!("Invalid amount: {}", amount)))
}
