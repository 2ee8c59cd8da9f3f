//! Ledger Service Integration Tests
//!
//! Balance mutations, entry history, concurrent writers and partial failures
//! against the in-memory store.
//!
//! Run with: cargo test --test ledger_test -- --nocapture

mod common;

use ajnabi_ledger::{tables, EntryCategory, LedgerError, LedgerService};
use common::TestBackend;

// ============================================================================
// Invariant: balance == sum of entries
// ============================================================================

#[tokio::test]
async fn test_balance_matches_entry_sum_after_mixed_mutations() {
    let env = TestBackend::new();
    let account = env.account_with(100).await;
    let ledger = &env.backend.ledger;

    ledger
        .credit(account.id, 15, EntryCategory::Reward, "Watched rewarded ad")
        .await
        .unwrap();
    ledger
        .debit(account.id, 10, EntryCategory::UnlockProfile, "Unlocked profile")
        .await
        .unwrap();
    ledger
        .credit(account.id, 350, EntryCategory::Purchase, "Purchased pack")
        .await
        .unwrap();
    ledger
        .debit(account.id, 50, EntryCategory::Boost, "Boost")
        .await
        .unwrap();

    let audit = ledger.audit(account.id).await.unwrap();
    assert_eq!(audit.balance, 405);
    assert_eq!(audit.ledger_sum, 405);
    assert_eq!(audit.entry_count, 5);
    assert!(audit.is_consistent());
}

#[tokio::test]
async fn test_debit_beyond_balance_changes_nothing() {
    let env = TestBackend::new();
    let account = env.account_with(20).await;
    let ledger = &env.backend.ledger;

    let err = ledger
        .debit(account.id, 21, EntryCategory::Chat, "Chat minutes")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        LedgerError::InsufficientFunds {
            balance: 20,
            requested: 21
        }
    );

    assert_eq!(ledger.balance(account.id).await.unwrap(), 20);
    let entries = ledger.list_entries(account.id, 50).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].category, EntryCategory::SignupBonus);
}

#[tokio::test]
async fn test_credit_is_newest_entry() {
    let env = TestBackend::new();
    let account = env.account_with(100).await;
    let ledger = &env.backend.ledger;

    ledger
        .credit(account.id, 15, EntryCategory::Reward, "Watched rewarded ad")
        .await
        .unwrap();

    let latest = ledger.list_entries(account.id, 1).await.unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].amount, 15);
    assert_eq!(latest[0].category, EntryCategory::Reward);
    assert_eq!(latest[0].description, "Watched rewarded ad");
    assert_eq!(latest[0].user_id, account.id);
}

#[tokio::test]
async fn test_list_entries_newest_first_and_bounded() {
    let env = TestBackend::new();
    let account = env.account_with(100).await;
    let ledger = &env.backend.ledger;

    for amount in 1..=5 {
        ledger
            .debit(account.id, amount, EntryCategory::Chat, "Chat minute")
            .await
            .unwrap();
    }

    let entries = ledger.list_entries(account.id, 3).await.unwrap();
    let amounts: Vec<i64> = entries.iter().map(|e| e.amount).collect();
    assert_eq!(amounts, vec![-5, -4, -3]);

    let all = ledger.list_entries(account.id, 50).await.unwrap();
    assert_eq!(all.len(), 6);
    assert_eq!(all.last().unwrap().category, EntryCategory::SignupBonus);
}

#[tokio::test]
async fn test_zero_amount_rejected() {
    let env = TestBackend::new();
    let account = env.account_with(100).await;

    let err = env
        .backend
        .ledger
        .credit(account.id, 0, EntryCategory::Reward, "nothing")
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::InvalidAmount(0));
}

#[tokio::test]
async fn test_unknown_account_is_not_found() {
    let env = TestBackend::new();
    let err = env
        .backend
        .ledger
        .credit(uuid::Uuid::new_v4(), 5, EntryCategory::Reward, "ghost")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { .. }));
}

// ============================================================================
// Concurrent writers
// ============================================================================

/// Both mutations read the same starting balance; the conditional write
/// makes the loser retry so neither update is lost.
#[tokio::test]
async fn test_concurrent_credit_and_debit_both_land() {
    let env = TestBackend::new();
    let account = env.account_with(100).await;
    let ledger = env.backend.ledger.clone();

    env.store.set_interleave(true);
    let (credit, debit) = tokio::join!(
        ledger.credit(account.id, 10, EntryCategory::Reward, "Reward"),
        ledger.debit(account.id, 5, EntryCategory::Reconnect, "Reconnect"),
    );
    env.store.set_interleave(false);

    credit.unwrap();
    debit.unwrap();
    assert!(env.store.lost_swaps() >= 1, "writers should have overlapped");

    let audit = ledger.audit(account.id).await.unwrap();
    assert_eq!(audit.balance, 105);
    assert!(audit.is_consistent());
}

#[tokio::test]
async fn test_persistent_conflict_gives_up() {
    let env = TestBackend::new();
    let account = env.account_with(100).await;
    let ledger = LedgerService::new(env.store.clone()).with_max_conflict_retries(2);

    env.store.set_starve_swaps(true);
    let err = ledger
        .debit(account.id, 5, EntryCategory::Boost, "Boost")
        .await
        .unwrap_err();
    env.store.set_starve_swaps(false);

    assert!(matches!(err, LedgerError::Conflict(_)));
    assert_eq!(env.store.lost_swaps(), 3);
    assert!(ledger.audit(account.id).await.unwrap().is_consistent());
}

// ============================================================================
// Partial failures
// ============================================================================

#[tokio::test]
async fn test_failed_entry_append_reverts_balance() {
    let env = TestBackend::new();
    let account = env.account_with(100).await;
    let ledger = &env.backend.ledger;

    env.store.fail_inserts_into(Some(tables::LEDGER));
    let err = ledger
        .debit(account.id, 30, EntryCategory::Boost, "Boost")
        .await
        .unwrap_err();
    env.store.fail_inserts_into(None);

    assert!(matches!(err, LedgerError::Connection(_)));
    let audit = ledger.audit(account.id).await.unwrap();
    assert_eq!(audit.balance, 100);
    assert_eq!(audit.entry_count, 1);
    assert!(audit.is_consistent());
}

#[tokio::test]
async fn test_offline_store_surfaces_connection_error() {
    let env = TestBackend::new();
    let account = env.account_with(100).await;

    env.store.set_offline(true);
    let err = env
        .backend
        .ledger
        .credit(account.id, 10, EntryCategory::Reward, "Reward")
        .await
        .unwrap_err();
    env.store.set_offline(false);

    assert!(err.is_remote());
    assert_eq!(env.backend.ledger.balance(account.id).await.unwrap(), 100);
}
