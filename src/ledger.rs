//! Coin ledger
//!
//! Every balance mutation is a conditional write on the account's `coins`
//! column followed by an append to the ledger table. The conditional write
//! retries when a concurrent writer got there first, so two mutations racing
//! on the same account both land instead of one overwriting the other.
//!
//! Balance write and entry append are still two remote calls. When the
//! append fails the balance change is reverted with an inverse adjustment
//! and the append error is returned.

use crate::error::LedgerError;
use crate::models::{AccountId, EntryCategory, LedgerEntry};
use crate::store::{self, tables, Direction, Query, RecordStore};
use crate::Result;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Entries returned by `list_entries` when the caller has no preference
pub const DEFAULT_ENTRY_LIMIT: usize = 50;

/// Lost conditional writes tolerated before giving up with `Conflict`
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 5;

/// Balance compared with the sum of all ledger entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LedgerAudit {
    pub balance: u64,
    pub ledger_sum: i64,
    pub entry_count: usize,
}

impl LedgerAudit {
    pub fn is_consistent(&self) -> bool {
        i128::from(self.balance) == i128::from(self.ledger_sum)
    }
}

#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn RecordStore>,
    max_conflict_retries: u32,
}

impl LedgerService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
        }
    }

    pub fn with_max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }

    /// Current balance as recorded by the store
    pub async fn balance(&self, account: AccountId) -> Result<u64> {
        let row: Value = store::fetch_one(
            self.store.as_ref(),
            tables::USERS,
            Query::new().eq("id", json!(account)),
            account,
        )
        .await?;

        row.get("coins")
            .and_then(Value::as_u64)
            .ok_or_else(|| LedgerError::InvalidResponse(format!("account {} has no coin balance", account)))
    }

    pub async fn credit(
        &self,
        account: AccountId,
        amount: u64,
        category: EntryCategory,
        description: &str,
    ) -> Result<()> {
        let delta = signed_amount(amount)?;
        self.apply(account, delta, category, description).await
    }

    /// Fails with `InsufficientFunds` (and changes nothing) when `amount`
    /// exceeds the balance
    pub async fn debit(
        &self,
        account: AccountId,
        amount: u64,
        category: EntryCategory,
        description: &str,
    ) -> Result<()> {
        let delta = signed_amount(amount)?;
        self.apply(account, -delta, category, description).await
    }

    /// Newest entries first, at most `limit` of them
    pub async fn list_entries(&self, account: AccountId, limit: usize) -> Result<Vec<LedgerEntry>> {
        let query = Query::new()
            .eq("user_id", json!(account))
            .order_by("created_at", Direction::Desc)
            .limit(limit);
        store::fetch_all(self.store.as_ref(), tables::LEDGER, &query).await
    }

    /// Compare the stored balance with the full entry history
    pub async fn audit(&self, account: AccountId) -> Result<LedgerAudit> {
        let balance = self.balance(account).await?;
        let entries: Vec<LedgerEntry> = store::fetch_all(
            self.store.as_ref(),
            tables::LEDGER,
            &Query::new().eq("user_id", json!(account)),
        )
        .await?;

        Ok(LedgerAudit {
            balance,
            ledger_sum: entries.iter().map(|e| e.amount).sum(),
            entry_count: entries.len(),
        })
    }

    async fn apply(
        &self,
        account: AccountId,
        delta: i64,
        category: EntryCategory,
        description: &str,
    ) -> Result<()> {
        let (before, after) = self.adjust_balance(account, delta).await?;
        log::debug!(
            "Balance of {} moved {} -> {} ({})",
            account,
            before,
            after,
            category
        );

        let entry = LedgerEntry::new(account, delta, category, description);
        if let Err(e) = store::insert_record(self.store.as_ref(), tables::LEDGER, &entry).await {
            log::error!("Failed to record {} entry for {}: {}", category, account, e);
            match self.adjust_balance(account, -delta).await {
                Ok(_) => log::warn!("Reverted balance change of {} for {}", delta, account),
                Err(revert) => log::error!(
                    "Could not revert balance change of {} for {}, balance and ledger now differ: {}",
                    delta,
                    account,
                    revert
                ),
            }
            return Err(e);
        }

        Ok(())
    }

    /// Read-check-swap loop on the `coins` column, returns (before, after)
    async fn adjust_balance(&self, account: AccountId, delta: i64) -> Result<(u64, u64)> {
        for attempt in 0..=self.max_conflict_retries {
            let before = self.balance(account).await?;
            let after = i128::from(before) + i128::from(delta);
            if after < 0 {
                return Err(LedgerError::InsufficientFunds {
                    balance: before,
                    requested: delta.unsigned_abs(),
                });
            }
            let after = u64::try_from(after).map_err(|_| LedgerError::InvalidAmount(delta.unsigned_abs()))?;

            let swapped = self
                .store
                .compare_and_swap(tables::USERS, account, "coins", json!(before), json!(after))
                .await?;
            if swapped {
                return Ok((before, after));
            }
            log::debug!(
                "Balance of {} changed concurrently (attempt {}), retrying",
                account,
                attempt + 1
            );
        }

        Err(LedgerError::Conflict(format!(
            "balance of {} kept changing after {} retries",
            account, self.max_conflict_retries
        )))
    }
}

fn signed_amount(amount: u64) -> Result<i64> {
    if amount == 0 {
        return Err(LedgerError::InvalidAmount(amount));
    }
    i64::try_from(amount).map_err(|_| LedgerError::InvalidAmount(amount))
}
