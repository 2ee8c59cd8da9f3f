//! Record types stored in the backend tables
//!
//! Field names follow the column names of the hosted store so records
//! round-trip through `serde_json::Value` without renaming.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub type AccountId = Uuid;

/// Maximum number of photos attached to an account
pub const MAX_PHOTOS: usize = 3;

// ============================================================================
// Accounts & Profiles
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    #[serde(default)]
    pub phone_number: Option<String>,
    pub is_anonymous: bool,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub photos: Vec<String>,
    pub coins: u64,
    pub is_premium: bool,
    #[serde(default)]
    pub premium_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_verified: bool,
    pub device_id: String,
    pub last_active: DateTime<Utc>,
}

impl Account {
    /// Fresh account with a zero balance; coins arrive through the ledger
    pub fn new(phone_number: Option<String>, device_id: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            is_anonymous: phone_number.is_none(),
            phone_number,
            bio: None,
            interests: Vec::new(),
            photos: Vec::new(),
            coins: 0,
            is_premium: false,
            premium_expires_at: None,
            created_at: now,
            updated_at: None,
            is_verified: false,
            device_id,
            last_active: now,
        }
    }

    /// Premium state as of `now`
    pub fn premium_status(&self, now: DateTime<Utc>) -> PremiumStatus {
        if !self.is_premium {
            return PremiumStatus::Inactive;
        }
        match self.premium_expires_at {
            Some(expires_at) if now > expires_at => PremiumStatus::Expired { expired_at: expires_at },
            expires_at => PremiumStatus::Active { expires_at },
        }
    }
}

/// Derived premium state of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PremiumStatus {
    Inactive,
    /// `expires_at == None` means a lifetime plan
    Active { expires_at: Option<DateTime<Utc>> },
    Expired { expired_at: DateTime<Utc> },
}

impl PremiumStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }
}

/// Partial update of an account; `None` fields are left untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interests: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photos: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_verified: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookingFor {
    Male,
    Female,
    Both,
}

impl LookingFor {
    /// The single gender asked for, `None` for `Both`
    pub fn gender(&self) -> Option<Gender> {
        match self {
            Self::Both => None,
            Self::Male => Some(Gender::Male),
            Self::Female => Some(Gender::Female),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub user_id: AccountId,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub age: Option<u8>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub looking_for: Option<LookingFor>,
    pub is_online: bool,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub looking_for: Option<LookingFor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_online: Option<bool>,
}

// ============================================================================
// Ledger
// ============================================================================

/// Why a ledger entry was written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryCategory {
    Purchase,
    Reward,
    UnlockProfile,
    Reconnect,
    Boost,
    Chat,
    SignupBonus,
}

impl EntryCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::Reward => "reward",
            Self::UnlockProfile => "unlock_profile",
            Self::Reconnect => "reconnect",
            Self::Boost => "boost",
            Self::Chat => "chat",
            Self::SignupBonus => "signup_bonus",
        }
    }
}

impl fmt::Display for EntryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "purchase" => Ok(Self::Purchase),
            "reward" => Ok(Self::Reward),
            "unlock_profile" => Ok(Self::UnlockProfile),
            "reconnect" => Ok(Self::Reconnect),
            "boost" => Ok(Self::Boost),
            "chat" => Ok(Self::Chat),
            "signup_bonus" => Ok(Self::SignupBonus),
            other => Err(format!("Unknown entry category: {}", other)),
        }
    }
}

/// Immutable record of one balance change (negative for spending)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub user_id: AccountId,
    pub amount: i64,
    #[serde(rename = "type")]
    pub category: EntryCategory,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn new(
        user_id: AccountId,
        amount: i64,
        category: EntryCategory,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            amount,
            category,
            description: description.into(),
            created_at: Utc::now(),
        }
    }
}

// ============================================================================
// Calls & Matches
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Connecting,
    Connected,
    Ended,
    Rejected,
}

impl CallStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended | Self::Rejected)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoCall {
    pub id: Uuid,
    pub caller_id: AccountId,
    pub receiver_id: AccountId,
    pub status: CallStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    /// Seconds
    #[serde(default)]
    pub duration: Option<u64>,
    /// 1-5 stars
    #[serde(default)]
    pub rating: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: Uuid,
    pub user1_id: AccountId,
    pub user2_id: AccountId,
    pub matched_at: DateTime<Utc>,
    #[serde(default)]
    pub last_message_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

/// Account offered by random matching, joined with its profile
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchCandidate {
    pub account: Account,
    pub profile: Profile,
}

// ============================================================================
// Catalog & Payments
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PremiumPlan {
    pub id: Uuid,
    pub name: String,
    /// `None` for lifetime plans
    #[serde(default)]
    pub duration_days: Option<u32>,
    pub price_inr: u32,
    #[serde(default)]
    pub features: Vec<String>,
    pub is_active: bool,
}

impl PremiumPlan {
    /// Expiry of a plan bought at `now`
    pub fn expires_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.duration_days
            .map(|days| now + Duration::days(i64::from(days)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinPack {
    pub id: Uuid,
    pub name: String,
    pub coins: u64,
    pub price_inr: u32,
    #[serde(default)]
    pub bonus_coins: u64,
    #[serde(default)]
    pub is_popular: bool,
    #[serde(default)]
    pub discount_percentage: Option<u8>,
}

impl CoinPack {
    pub fn total_coins(&self) -> u64 {
        self.coins + self.bonus_coins
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Created,
    Paid,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Coins,
    Premium,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentOrder {
    pub id: Uuid,
    pub user_id: AccountId,
    /// Reference handed to the payment gateway
    pub gateway_order_id: String,
    /// Amount in INR
    pub amount: u64,
    pub currency: String,
    pub status: OrderStatus,
    pub item_type: ItemType,
    pub item_id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub payment_id: Option<String>,
}

/// Tunable prices and rewards, newest row wins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub free_signup_coins: u64,
    pub unlock_profile_cost: u64,
    pub reconnect_cost: u64,
    pub boost_cost: u64,
    pub boost_duration_hours: u32,
    pub chat_cost_per_minute: u64,
    pub rewarded_ad_coins: u64,
    pub min_app_version: String,
    pub maintenance_mode: bool,
    pub telegram_group_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            free_signup_coins: 100,
            unlock_profile_cost: 10,
            reconnect_cost: 5,
            boost_cost: 50,
            boost_duration_hours: 1,
            chat_cost_per_minute: 2,
            rewarded_ad_coins: 15,
            min_app_version: "1.0.0".to_string(),
            maintenance_mode: false,
            telegram_group_url: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn premium_status_follows_expiry() {
        let now = Utc::now();
        let mut account = Account::new(None, "device".to_string());
        assert_eq!(account.premium_status(now), PremiumStatus::Inactive);

        account.is_premium = true;
        assert_eq!(
            account.premium_status(now),
            PremiumStatus::Active { expires_at: None }
        );

        let past = now - Duration::days(1);
        account.premium_expires_at = Some(past);
        assert_eq!(
            account.premium_status(now),
            PremiumStatus::Expired { expired_at: past }
        );
    }

    #[test]
    fn entry_category_uses_column_names() {
        let entry = LedgerEntry::new(Uuid::new_v4(), -5, EntryCategory::UnlockProfile, "x");
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["type"], "unlock_profile");
        assert_eq!("signup_bonus".parse::<EntryCategory>(), Ok(EntryCategory::SignupBonus));
        assert!("refund".parse::<EntryCategory>().is_err());
    }

    #[test]
    fn lifetime_plan_has_no_expiry() {
        let plan = PremiumPlan {
            id: Uuid::new_v4(),
            name: "Lifetime Premium".to_string(),
            duration_days: None,
            price_inr: 899,
            features: Vec::new(),
            is_active: true,
        };
        assert_eq!(plan.expires_at(Utc::now()), None);
    }
}
