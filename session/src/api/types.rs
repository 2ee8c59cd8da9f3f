use ajnabi_ledger::{EntryCategory, DEFAULT_ENTRY_LIMIT};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub phone_number: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CoinsRequest {
    pub amount: u64,
    #[serde(rename = "type")]
    pub category: EntryCategory,
    pub description: String,
}

/// Result of a coin action, mirroring the boolean the action returns
#[derive(Debug, Serialize, Deserialize)]
pub struct CoinsResponse {
    pub success: bool,
    pub coins: Option<u64>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    #[serde(default = "default_transaction_limit")]
    pub limit: usize,
}

fn default_transaction_limit() -> usize {
    DEFAULT_ENTRY_LIMIT
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PremiumStatusResponse {
    pub is_premium: bool,
    pub premium_expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ActivatePremiumRequest {
    pub plan_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct SignOutResponse {
    pub status: String,
}
