//! Account and profile records
//!
//! New accounts start at zero coins; the signup bonus is credited through
//! the ledger so the balance and entry history agree from the first entry.

use crate::error::LedgerError;
use crate::ledger::LedgerService;
use crate::models::{
    Account, AccountId, AccountUpdate, EntryCategory, PremiumPlan, Profile, ProfileUpdate,
    MAX_PHOTOS,
};
use crate::store::{self, tables, Filter, Query, RecordStore};
use crate::subscription::{ChannelSpec, Subscription};
use crate::Result;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

pub const SIGNUP_BONUS_DESCRIPTION: &str = "Welcome bonus for new user";

#[derive(Clone)]
pub struct Accounts {
    store: Arc<dyn RecordStore>,
    ledger: LedgerService,
}

impl Accounts {
    pub fn new(store: Arc<dyn RecordStore>, ledger: LedgerService) -> Self {
        Self { store, ledger }
    }

    // ============================================================================
    // Accounts
    // ============================================================================

    /// Register an account; anonymous unless a phone number is given
    pub async fn create_account(
        &self,
        phone_number: Option<&str>,
        device_id: Option<&str>,
        signup_bonus: u64,
    ) -> Result<Account> {
        let device_id = device_id
            .map(str::to_string)
            .unwrap_or_else(|| format!("device_{}", Utc::now().timestamp_millis()));
        let account = Account::new(phone_number.map(str::to_string), device_id);
        let account = store::insert_record(self.store.as_ref(), tables::USERS, &account).await?;
        log::info!(
            "Created {} account {}",
            if account.is_anonymous { "anonymous" } else { "phone" },
            account.id
        );

        if signup_bonus == 0 {
            return Ok(account);
        }
        if let Err(e) = self
            .ledger
            .credit(account.id, signup_bonus, EntryCategory::SignupBonus, SIGNUP_BONUS_DESCRIPTION)
            .await
        {
            log::error!("Failed to credit signup bonus to {}: {}", account.id, e);
            return Ok(account);
        }

        match self.get_account(account.id).await {
            Ok(fresh) => Ok(fresh),
            Err(e) => {
                log::warn!("Could not re-read account {} after signup bonus: {}", account.id, e);
                Ok(Account {
                    coins: signup_bonus,
                    ..account
                })
            }
        }
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Account> {
        store::fetch_one(
            self.store.as_ref(),
            tables::USERS,
            Query::new().eq("id", json!(id)),
            id,
        )
        .await
    }

    pub async fn get_account_by_phone(&self, phone_number: &str) -> Result<Account> {
        store::fetch_one(
            self.store.as_ref(),
            tables::USERS,
            Query::new().eq("phone_number", json!(phone_number)),
            phone_number,
        )
        .await
    }

    /// Apply a partial update and stamp `updated_at`
    pub async fn update_account(&self, id: AccountId, update: &AccountUpdate) -> Result<Account> {
        if let Some(photos) = &update.photos {
            if photos.len() > MAX_PHOTOS {
                return Err(LedgerError::InvalidRecord(format!(
                    "at most {} photos allowed, got {}",
                    MAX_PHOTOS,
                    photos.len()
                )));
            }
        }

        let mut patch = serde_json::to_value(update)?;
        if let Value::Object(fields) = &mut patch {
            if let Some(phone) = update.phone_number.as_ref() {
                fields.insert("is_anonymous".to_string(), json!(phone.is_empty()));
            }
            fields.insert("updated_at".to_string(), json!(Utc::now()));
        }
        store::update_one(
            self.store.as_ref(),
            tables::USERS,
            &Filter::new().eq("id", json!(id)),
            patch,
            id,
        )
        .await
    }

    pub async fn touch_last_active(&self, id: AccountId) -> Result<()> {
        let _: Account = store::update_one(
            self.store.as_ref(),
            tables::USERS,
            &Filter::new().eq("id", json!(id)),
            json!({ "last_active": Utc::now() }),
            id,
        )
        .await?;
        Ok(())
    }

    /// Turn on premium for the plan's duration; lifetime plans never expire
    pub async fn activate_premium(&self, id: AccountId, plan_id: Uuid) -> Result<Account> {
        let plan: PremiumPlan = store::fetch_one(
            self.store.as_ref(),
            tables::PLANS,
            Query::new().eq("id", json!(plan_id)),
            plan_id,
        )
        .await?;
        if !plan.is_active {
            return Err(LedgerError::InvalidRecord(format!(
                "premium plan {} is no longer offered",
                plan.name
            )));
        }

        let now = Utc::now();
        let expires_at = plan.expires_at(now);
        let account: Account = store::update_one(
            self.store.as_ref(),
            tables::USERS,
            &Filter::new().eq("id", json!(id)),
            json!({
                "is_premium": true,
                "premium_expires_at": expires_at,
                "updated_at": now,
            }),
            id,
        )
        .await?;
        log::info!("Activated {} for {}", plan.name, id);
        Ok(account)
    }

    /// Remote updates of the account row
    pub async fn subscribe_to_account(&self, id: AccountId) -> Result<Subscription> {
        self.store.subscribe(ChannelSpec::account_updates(id)).await
    }

    // ============================================================================
    // Profiles
    // ============================================================================

    pub async fn create_profile(&self, user_id: AccountId, profile: &ProfileUpdate) -> Result<Profile> {
        let profile = Profile {
            id: Uuid::new_v4(),
            user_id,
            display_name: profile.display_name.clone(),
            age: profile.age,
            gender: profile.gender,
            location: profile.location.clone(),
            looking_for: profile.looking_for,
            is_online: true,
            last_seen: Utc::now(),
        };
        store::insert_record(self.store.as_ref(), tables::PROFILES, &profile).await
    }

    pub async fn get_profile(&self, user_id: AccountId) -> Result<Profile> {
        store::fetch_one(
            self.store.as_ref(),
            tables::PROFILES,
            Query::new().eq("user_id", json!(user_id)),
            user_id,
        )
        .await
    }

    pub async fn update_profile(&self, user_id: AccountId, update: &ProfileUpdate) -> Result<Profile> {
        store::update_one(
            self.store.as_ref(),
            tables::PROFILES,
            &Filter::new().eq("user_id", json!(user_id)),
            serde_json::to_value(update)?,
            user_id,
        )
        .await
    }
}
