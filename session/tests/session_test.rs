//! Session Manager Integration Tests
//!
//! Snapshot restore and reconciliation, optimistic coin actions with
//! rollback, premium expiry and remote update mirroring.
//!
//! Run with: cargo test -p session --test session_test -- --nocapture

mod common;

use ajnabi_ledger::{EntryCategory, ProfileUpdate};
use common::TestSession;
use session::manager::COIN_TRANSACTION_FAILED;
use session::storage::keys;
use std::time::Duration;
use tokio::time::timeout;

// ============================================================================
// Load & reconcile
// ============================================================================

#[tokio::test]
async fn test_load_without_snapshot_or_store_has_no_account() -> anyhow::Result<()> {
    let env = TestSession::new()?;
    env.store.set_offline(true);

    let account = env.manager.load().await;

    assert!(account.is_none());
    let snapshot = env.manager.snapshot();
    assert!(snapshot.account.is_none());
    assert!(!snapshot.is_loading);
    Ok(())
}

#[tokio::test]
async fn test_load_keeps_snapshot_when_store_unreachable() -> anyhow::Result<()> {
    let env = TestSession::new()?;
    let created = env.manager.create_account(None).await.expect("signup");

    let restarted = env.restart();
    env.store.set_offline(true);
    let loaded = restarted.load().await.expect("persisted account");

    assert_eq!(loaded.id, created.id);
    assert_eq!(loaded.coins, 100);
    Ok(())
}

#[tokio::test]
async fn test_load_replaces_snapshot_with_remote_record() -> anyhow::Result<()> {
    let env = TestSession::new()?;
    let created = env.manager.create_account(None).await.expect("signup");
    assert!(env.manager.add_coins(50, EntryCategory::Purchase, "Purchased pack").await);

    // Local snapshot drifts from the remote record
    let restarted = env.restart();
    restarted.state().restore();
    restarted.state().apply_delta(-120)?;
    assert_eq!(restarted.snapshot().account.unwrap().coins, 30);

    let loaded = restarted.load().await.expect("remote account");
    assert_eq!(loaded.id, created.id);
    assert_eq!(loaded.coins, 150);
    assert_eq!(env.remote_coins(created.id).await, 150);
    Ok(())
}

#[tokio::test]
async fn test_signup_persists_account_and_profile_updates() -> anyhow::Result<()> {
    let env = TestSession::new()?;
    let account = env
        .manager
        .create_account(Some("+919812345678"))
        .await
        .expect("signup");
    assert!(!account.is_anonymous);
    assert_eq!(account.device_id, "test-device");

    let profile = env
        .manager
        .update_profile(ProfileUpdate {
            display_name: Some("Ravi".into()),
            ..Default::default()
        })
        .await
        .expect("profile created on first update");
    assert_eq!(profile.user_id, account.id);

    let storage = env.manager.state().storage();
    assert!(storage.get_item(keys::USER)?.is_some());
    assert!(storage.get_item(keys::PROFILE)?.is_some());
    Ok(())
}

// ============================================================================
// Coins
// ============================================================================

#[tokio::test]
async fn test_spend_refused_locally_when_balance_too_low() -> anyhow::Result<()> {
    let env = TestSession::new()?;
    let account = env.manager.create_account(None).await.expect("signup");

    assert!(!env.manager.spend_coins(101, EntryCategory::Boost, "Boost").await);

    let snapshot = env.manager.snapshot();
    assert_eq!(snapshot.error.as_deref(), Some("Insufficient coins"));
    assert_eq!(snapshot.account.unwrap().coins, 100);
    assert_eq!(env.manager.transactions(10).await.len(), 1);
    assert_eq!(env.remote_coins(account.id).await, 100);
    Ok(())
}

#[tokio::test]
async fn test_spend_updates_cache_and_ledger() -> anyhow::Result<()> {
    let env = TestSession::new()?;
    let account = env.manager.create_account(None).await.expect("signup");

    assert!(env.manager.unlock_profile().await);
    assert!(env.manager.reconnect().await);

    assert_eq!(env.manager.snapshot().account.unwrap().coins, 85);
    assert_eq!(env.remote_coins(account.id).await, 85);

    let history = env.manager.transactions(2).await;
    assert_eq!(history[0].category, EntryCategory::Reconnect);
    assert_eq!(history[0].amount, -5);
    assert_eq!(history[1].category, EntryCategory::UnlockProfile);
    Ok(())
}

#[tokio::test]
async fn test_failed_remote_write_rolls_back_cache() -> anyhow::Result<()> {
    let env = TestSession::new()?;
    env.manager.create_account(None).await.expect("signup");

    env.store.set_offline(true);
    assert!(!env.manager.claim_ad_reward().await);
    assert!(!env.manager.spend_coins(20, EntryCategory::Chat, "Chat").await);
    env.store.set_offline(false);

    let snapshot = env.manager.snapshot();
    assert_eq!(snapshot.account.unwrap().coins, 100);
    assert_eq!(snapshot.error.as_deref(), Some(COIN_TRANSACTION_FAILED));

    // next success clears the message
    assert!(env.manager.claim_ad_reward().await);
    let snapshot = env.manager.snapshot();
    assert_eq!(snapshot.error, None);
    assert_eq!(snapshot.account.unwrap().coins, 115);
    Ok(())
}

#[tokio::test]
async fn test_actions_without_account_report_false() -> anyhow::Result<()> {
    let env = TestSession::new()?;

    assert!(!env.manager.add_coins(10, EntryCategory::Reward, "Reward").await);
    assert_eq!(env.manager.snapshot().error.as_deref(), Some("No account found"));
    assert!(!env.manager.touch_last_active().await);
    assert!(env.manager.transactions(10).await.is_empty());
    assert!(!env.manager.check_premium_status());
    Ok(())
}

// ============================================================================
// Premium
// ============================================================================

#[tokio::test]
async fn test_premium_activation_and_local_expiry() -> anyhow::Result<()> {
    let env = TestSession::new()?;
    env.manager.create_account(None).await.expect("signup");
    let day = env.seed_plan("1-Day Premium", Some(1), 29).await;

    assert!(env.manager.activate_premium(day).await);
    assert!(env.manager.check_premium_status());

    // Pretend the plan lapsed yesterday
    let expired = chrono::Utc::now() - chrono::Duration::days(1);
    env.manager.state().set_premium(true, Some(expired))?;
    assert!(!env.manager.check_premium_status());
    assert!(!env.manager.snapshot().account.unwrap().is_premium);
    Ok(())
}

#[tokio::test]
async fn test_lifetime_premium_never_lapses() -> anyhow::Result<()> {
    let env = TestSession::new()?;
    env.manager.create_account(None).await.expect("signup");
    let lifetime = env.seed_plan("Lifetime Premium", None, 899).await;

    assert!(env.manager.activate_premium(lifetime).await);
    let account = env.manager.snapshot().account.unwrap();
    assert!(account.is_premium);
    assert_eq!(account.premium_expires_at, None);
    assert!(env.manager.check_premium_status());
    Ok(())
}

// ============================================================================
// Sign-out & remote updates
// ============================================================================

#[tokio::test]
async fn test_sign_out_clears_memory_and_storage() -> anyhow::Result<()> {
    let env = TestSession::new()?;
    env.manager.create_account(None).await.expect("signup");
    assert!(env.manager.watch_account().await);

    env.manager.sign_out().await;

    assert_eq!(env.manager.snapshot(), Default::default());
    let storage = env.manager.state().storage();
    assert!(storage.get_item(keys::USER)?.is_none());
    assert!(storage.get_item(keys::PROFILE)?.is_none());

    // the aborted watcher releases its channel once the runtime drops it
    timeout(Duration::from_secs(2), async {
        while !env.store.inner.active_channels().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await?;

    assert!(env.restart().load().await.is_none());
    Ok(())
}

#[tokio::test]
async fn test_watch_account_mirrors_remote_credit() -> anyhow::Result<()> {
    let env = TestSession::new()?;
    let account = env.manager.create_account(None).await.expect("signup");
    let mut rx = env.manager.subscribe();
    rx.borrow_and_update();

    assert!(env.manager.watch_account().await);

    // A purchase settled by another device
    let other = env.restart();
    other.load().await.expect("same account");
    assert!(other.add_coins(400, EntryCategory::Purchase, "Purchased pack").await);

    let coins = timeout(Duration::from_secs(2), async {
        loop {
            rx.changed().await.expect("session alive");
            let coins = rx.borrow_and_update().account.as_ref().map(|a| a.coins);
            if coins == Some(500) {
                return coins;
            }
        }
    })
    .await?;
    assert_eq!(coins, Some(500));
    assert_eq!(env.remote_coins(account.id).await, 500);

    env.manager.stop_watching();
    Ok(())
}
