/// Session State Cache
///
/// Holds at most one account and its profile for the running session,
/// mirrors both to durable storage in lockstep, and publishes every change as
/// a `SessionSnapshot` on a watch channel.
///
/// Every mutation here is local only; the session manager decides when the
/// remote store is consulted.

use ajnabi_ledger::{Account, Profile};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

use crate::error::StorageError;
use crate::storage::{keys, Storage};

/// What observers of the session see
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub account: Option<Account>,
    pub profile: Option<Profile>,
    pub is_loading: bool,
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct SessionState {
    storage: Storage,
    tx: Arc<watch::Sender<SessionSnapshot>>,
}

impl SessionState {
    pub fn new(storage: Storage) -> Self {
        let (tx, _rx) = watch::channel(SessionSnapshot::default());
        Self {
            storage,
            tx: Arc::new(tx),
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Receive every published snapshot from now on
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.tx.borrow().clone()
    }

    pub fn account(&self) -> Option<Account> {
        self.tx.borrow().account.clone()
    }

    pub fn profile(&self) -> Option<Profile> {
        self.tx.borrow().profile.clone()
    }

    // ============================================================================
    // Account & profile (persisted)
    // ============================================================================

    /// Replace the cached account; `None` also removes the stored copy
    pub fn set_account(&self, account: Option<Account>) -> Result<(), StorageError> {
        self.tx.send_modify(|s| s.account = account.clone());
        match account {
            Some(account) => self.storage.save(keys::USER, &account),
            None => self.storage.remove_item(keys::USER),
        }
    }

    /// Replace the cached profile; `None` also removes the stored copy
    pub fn set_profile(&self, profile: Option<Profile>) -> Result<(), StorageError> {
        self.tx.send_modify(|s| s.profile = profile.clone());
        match profile {
            Some(profile) => self.storage.save(keys::PROFILE, &profile),
            None => self.storage.remove_item(keys::PROFILE),
        }
    }

    /// Adjust the cached balance by `amount` without consulting the ledger
    ///
    /// Saturates at zero. Returns the new balance, or `None` with no account.
    pub fn apply_delta(&self, amount: i64) -> Result<Option<u64>, StorageError> {
        let Some(account) = self.update_account(|account| {
            account.coins = if amount >= 0 {
                account.coins.saturating_add(amount.unsigned_abs())
            } else {
                account.coins.saturating_sub(amount.unsigned_abs())
            };
        }) else {
            return Ok(None);
        };
        self.storage.save(keys::USER, &account)?;
        Ok(Some(account.coins))
    }

    pub fn set_premium(
        &self,
        is_premium: bool,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StorageError> {
        if let Some(account) = self.update_account(|account| {
            account.is_premium = is_premium;
            account.premium_expires_at = expires_at;
        }) {
            self.storage.save(keys::USER, &account)?;
        }
        Ok(())
    }

    /// Demote a lapsed premium flag; true while premium is still in effect
    ///
    /// Only the local copy changes. A premium account without an expiry is a
    /// lifetime plan and stays active.
    pub fn check_premium_expiry(&self, now: DateTime<Utc>) -> Result<bool, StorageError> {
        let Some(account) = self.account() else {
            return Ok(false);
        };
        if !account.is_premium {
            return Ok(false);
        }
        match account.premium_expires_at {
            Some(expires_at) if now > expires_at => {
                log::info!("Premium for {} expired at {}", account.id, expires_at);
                self.set_premium(false, None)?;
                Ok(false)
            }
            _ => Ok(true),
        }
    }

    /// Publish the persisted snapshot, if any
    ///
    /// Unreadable entries are dropped from storage and treated as absent.
    pub fn restore(&self) -> (Option<Account>, Option<Profile>) {
        let account = self.load_or_discard::<Account>(keys::USER);
        let profile = self.load_or_discard::<Profile>(keys::PROFILE);
        self.tx.send_modify(|s| {
            s.account = account.clone();
            s.profile = profile.clone();
        });
        (account, profile)
    }

    /// Forget the session in memory and on disk
    pub fn clear(&self) -> Result<(), StorageError> {
        self.tx.send_replace(SessionSnapshot::default());
        self.storage.clear()
    }

    // ============================================================================
    // Transient flags (not persisted)
    // ============================================================================

    pub fn set_loading(&self, is_loading: bool) {
        self.tx.send_modify(|s| s.is_loading = is_loading);
    }

    pub fn set_error(&self, error: impl Into<String>) {
        let error = error.into();
        self.tx.send_modify(|s| s.error = Some(error));
    }

    pub fn clear_error(&self) {
        self.tx.send_if_modified(|s| s.error.take().is_some());
    }

    fn update_account(&self, f: impl FnOnce(&mut Account)) -> Option<Account> {
        let mut updated = None;
        self.tx.send_if_modified(|s| match s.account.as_mut() {
            Some(account) => {
                f(account);
                updated = Some(account.clone());
                true
            }
            None => false,
        });
        updated
    }

    fn load_or_discard<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.storage.load(key) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Discarding unreadable '{}' snapshot: {}", key, e);
                if let Err(e) = self.storage.remove_item(key) {
                    log::warn!("Failed to remove '{}' snapshot: {}", key, e);
                }
                None
            }
        }
    }
}
