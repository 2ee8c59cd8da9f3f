/// Video-call records, random matching and match subscriptions
///
/// Only the records are kept here; media transport is not part of this crate.

use crate::models::{
    Account, AccountId, CallStatus, LookingFor, Match, MatchCandidate, Profile, VideoCall,
};
use crate::store::{self, tables, Filter, Query, RecordStore};
use crate::subscription::{ChannelSpec, Subscription};
use crate::Result;
use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Matches offered per search
pub const MATCH_LIMIT: usize = 10;
const ACTIVE_WINDOW_HOURS: i64 = 24;

#[derive(Clone)]
pub struct Calls {
    store: Arc<dyn RecordStore>,
}

impl Calls {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn create_call(&self, caller: AccountId, receiver: AccountId) -> Result<VideoCall> {
        let call = VideoCall {
            id: Uuid::new_v4(),
            caller_id: caller,
            receiver_id: receiver,
            status: CallStatus::Connecting,
            started_at: Utc::now(),
            ended_at: None,
            duration: None,
            rating: None,
        };
        store::insert_record(self.store.as_ref(), tables::CALLS, &call).await
    }

    /// Terminal statuses stamp `ended_at`; `duration` is kept only for those
    pub async fn update_call_status(
        &self,
        call: Uuid,
        status: CallStatus,
        duration: Option<u64>,
    ) -> Result<VideoCall> {
        let mut patch = serde_json::Map::new();
        patch.insert("status".to_string(), json!(status));
        if status.is_terminal() {
            patch.insert("ended_at".to_string(), json!(Utc::now()));
            if let Some(seconds) = duration.filter(|s| *s > 0) {
                patch.insert("duration".to_string(), json!(seconds));
            }
        }
        store::update_one(
            self.store.as_ref(),
            tables::CALLS,
            &Filter::new().eq("id", json!(call)),
            patch.into(),
            call,
        )
        .await
    }

    pub async fn subscribe_to_call(&self, call: Uuid) -> Result<Subscription> {
        self.store.subscribe(ChannelSpec::call_updates(call)).await
    }

    // ============================================================================
    // Matching
    // ============================================================================

    /// Other accounts active in the last day with an online profile
    ///
    /// Online status and gender are filtered in the profile query, so offline
    /// accounts never crowd out a match.
    pub async fn find_random_match(
        &self,
        account: AccountId,
        preference: Option<LookingFor>,
    ) -> Result<Vec<MatchCandidate>> {
        let mut query = Query::new()
            .eq("is_online", json!(true))
            .neq("user_id", json!(account));
        if let Some(gender) = preference.and_then(|p| p.gender()) {
            query = query.eq("gender", json!(gender));
        }
        let profiles: Vec<Profile> = store::fetch_all(self.store.as_ref(), tables::PROFILES, &query).await?;

        let active_since = Utc::now() - Duration::hours(ACTIVE_WINDOW_HOURS);
        let mut found = Vec::new();
        for profile in profiles {
            let accounts: Vec<Account> = store::fetch_all(
                self.store.as_ref(),
                tables::USERS,
                &Query::new()
                    .eq("id", json!(profile.user_id))
                    .gt("last_active", json!(active_since))
                    .limit(1),
            )
            .await?;
            let Some(candidate) = accounts.into_iter().next() else {
                continue;
            };
            found.push(MatchCandidate {
                account: candidate,
                profile,
            });
            if found.len() == MATCH_LIMIT {
                break;
            }
        }

        log::debug!("Found {} match candidate(s) for {}", found.len(), account);
        Ok(found)
    }

    pub async fn create_match(&self, user1: AccountId, user2: AccountId) -> Result<Match> {
        let record = Match {
            id: Uuid::new_v4(),
            user1_id: user1,
            user2_id: user2,
            matched_at: Utc::now(),
            last_message_at: None,
            is_active: true,
        };
        store::insert_record(self.store.as_ref(), tables::MATCHES, &record).await
    }

    /// Active matches on either side, newest first
    pub async fn active_matches(&self, account: AccountId) -> Result<Vec<Match>> {
        let mut matches = Vec::new();
        for side in ["user1_id", "user2_id"] {
            let query = Query::new()
                .eq(side, json!(account))
                .eq("is_active", json!(true));
            let found: Vec<Match> = store::fetch_all(self.store.as_ref(), tables::MATCHES, &query).await?;
            matches.extend(found);
        }
        matches.sort_by(|a, b| b.matched_at.cmp(&a.matched_at));
        Ok(matches)
    }

    pub async fn subscribe_to_matches(&self, account: AccountId) -> Result<Subscription> {
        self.store.subscribe(ChannelSpec::match_changes(account)).await
    }
}
