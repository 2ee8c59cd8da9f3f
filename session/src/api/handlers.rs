use ajnabi_ledger::{Account, LedgerEntry, Profile, ProfileUpdate};
use axum::{
    extract::{Query, State},
    Json,
};
use std::sync::Arc;

use super::types::{
    ActivatePremiumRequest, CoinsRequest, CoinsResponse, PremiumStatusResponse, SignOutResponse,
    SignupRequest, TransactionsQuery,
};
use crate::error::SessionError;
use crate::manager::{CatalogView, SessionManager};
use crate::state::SessionSnapshot;

pub async fn get_session_handler(
    State(manager): State<Arc<SessionManager>>,
) -> Json<SessionSnapshot> {
    Json(manager.snapshot())
}

pub async fn load_session_handler(
    State(manager): State<Arc<SessionManager>>,
) -> Json<SessionSnapshot> {
    if manager.load().await.is_some() {
        manager.watch_account().await;
    }
    Json(manager.snapshot())
}

pub async fn signup_handler(
    State(manager): State<Arc<SessionManager>>,
    body: Option<Json<SignupRequest>>,
) -> Result<Json<Account>, SessionError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let account = manager
        .create_account(req.phone_number.as_deref())
        .await
        .ok_or_else(|| SessionError::Internal(last_error(&manager)))?;
    manager.watch_account().await;
    Ok(Json(account))
}

pub async fn sign_out_handler(
    State(manager): State<Arc<SessionManager>>,
) -> Json<SignOutResponse> {
    manager.sign_out().await;
    Json(SignOutResponse {
        status: "signed_out".to_string(),
    })
}

pub async fn update_profile_handler(
    State(manager): State<Arc<SessionManager>>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<Profile>, SessionError> {
    require_account(&manager)?;
    let profile = manager
        .update_profile(update)
        .await
        .ok_or_else(|| SessionError::Internal(last_error(&manager)))?;
    Ok(Json(profile))
}

pub async fn spend_coins_handler(
    State(manager): State<Arc<SessionManager>>,
    Json(req): Json<CoinsRequest>,
) -> Json<CoinsResponse> {
    let success = manager
        .spend_coins(req.amount, req.category, &req.description)
        .await;
    Json(coins_response(&manager, success))
}

pub async fn add_coins_handler(
    State(manager): State<Arc<SessionManager>>,
    Json(req): Json<CoinsRequest>,
) -> Json<CoinsResponse> {
    let success = manager
        .add_coins(req.amount, req.category, &req.description)
        .await;
    Json(coins_response(&manager, success))
}

pub async fn claim_reward_handler(
    State(manager): State<Arc<SessionManager>>,
) -> Json<CoinsResponse> {
    let success = manager.claim_ad_reward().await;
    Json(coins_response(&manager, success))
}

pub async fn transactions_handler(
    State(manager): State<Arc<SessionManager>>,
    Query(query): Query<TransactionsQuery>,
) -> Json<Vec<LedgerEntry>> {
    Json(manager.transactions(query.limit).await)
}

pub async fn premium_status_handler(
    State(manager): State<Arc<SessionManager>>,
) -> Json<PremiumStatusResponse> {
    let is_premium = manager.check_premium_status();
    let premium_expires_at = manager
        .snapshot()
        .account
        .and_then(|a| a.premium_expires_at);
    Json(PremiumStatusResponse {
        is_premium,
        premium_expires_at,
    })
}

pub async fn activate_premium_handler(
    State(manager): State<Arc<SessionManager>>,
    Json(req): Json<ActivatePremiumRequest>,
) -> Result<Json<SessionSnapshot>, SessionError> {
    require_account(&manager)?;
    if !manager.activate_premium(req.plan_id).await {
        return Err(SessionError::Internal(last_error(&manager)));
    }
    Ok(Json(manager.snapshot()))
}

pub async fn catalog_handler(
    State(manager): State<Arc<SessionManager>>,
) -> Result<Json<CatalogView>, SessionError> {
    Ok(Json(manager.catalog().await?))
}

fn coins_response(manager: &SessionManager, success: bool) -> CoinsResponse {
    let snapshot = manager.snapshot();
    CoinsResponse {
        success,
        coins: snapshot.account.map(|a| a.coins),
        error: if success { None } else { snapshot.error },
    }
}

fn require_account(manager: &SessionManager) -> Result<(), SessionError> {
    match manager.snapshot().account {
        Some(_) => Ok(()),
        None => Err(SessionError::NoAccount),
    }
}

fn last_error(manager: &SessionManager) -> String {
    manager
        .snapshot()
        .error
        .unwrap_or_else(|| "Unknown error".to_string())
}
