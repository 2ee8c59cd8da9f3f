//! Real-time change subscriptions
//!
//! A subscription is a named channel with one or more listeners. Events are
//! delivered lazily through [`Subscription`], which implements
//! `futures::Stream`. Cancelling or dropping the handle stops the forwarding
//! task and deregisters the channel.

use crate::models::AccountId;
use crate::store::{tables, Filter};
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Buffered events per subscription before the forwarder waits
pub const SUBSCRIPTION_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One row change, numbered in store order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub seq: u64,
    pub table: String,
    pub kind: ChangeKind,
    pub record: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listener {
    pub table: String,
    /// `None` listens to every kind of change
    #[serde(default)]
    pub kind: Option<ChangeKind>,
    #[serde(default)]
    pub filter: Filter,
}

impl Listener {
    pub fn new(table: &str, kind: Option<ChangeKind>, filter: Filter) -> Self {
        Self {
            table: table.to_string(),
            kind,
            filter,
        }
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        self.table == event.table
            && self.kind.map_or(true, |kind| kind == event.kind)
            && self.filter.matches(&event.record)
    }
}

/// Channel definition: an event is delivered if any listener matches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSpec {
    pub name: String,
    pub listeners: Vec<Listener>,
}

impl ChannelSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            listeners: Vec::new(),
        }
    }

    pub fn on(mut self, listener: Listener) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        self.listeners.iter().any(|l| l.matches(event))
    }

    /// Status updates of a single call
    pub fn call_updates(call_id: Uuid) -> Self {
        Self::new(format!("video_call_{}", call_id)).on(Listener::new(
            tables::CALLS,
            Some(ChangeKind::Update),
            Filter::new().eq("id", json!(call_id)),
        ))
    }

    /// Updates of an account row (balance, premium flag, ...)
    pub fn account_updates(account: AccountId) -> Self {
        Self::new(format!("user_{}", account)).on(Listener::new(
            tables::USERS,
            Some(ChangeKind::Update),
            Filter::new().eq("id", json!(account)),
        ))
    }

    /// Any change to a match the account takes part in, on either side
    pub fn match_changes(account: AccountId) -> Self {
        Self::new(format!("matches_{}", account))
            .on(Listener::new(
                tables::MATCHES,
                None,
                Filter::new().eq("user1_id", json!(account)),
            ))
            .on(Listener::new(
                tables::MATCHES,
                None,
                Filter::new().eq("user2_id", json!(account)),
            ))
    }
}

/// Tracks open channels by name
#[derive(Debug, Clone, Default)]
pub struct ChannelRegistry {
    active: Arc<Mutex<HashMap<String, usize>>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: &str) -> ChannelGuard {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        *active.entry(name.to_string()).or_insert(0) += 1;
        log::debug!("Registered channel {}", name);
        ChannelGuard {
            registry: self.clone(),
            name: name.to_string(),
        }
    }

    /// Names of channels with at least one live subscription
    pub fn names(&self) -> Vec<String> {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = active.keys().cloned().collect();
        names.sort();
        names
    }

    fn release(&self, name: &str) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(count) = active.get_mut(name) {
            *count -= 1;
            if *count == 0 {
                active.remove(name);
                log::debug!("Deregistered channel {}", name);
            }
        }
    }
}

/// Keeps a channel registered until dropped
#[derive(Debug)]
pub struct ChannelGuard {
    registry: ChannelRegistry,
    name: String,
}

impl Drop for ChannelGuard {
    fn drop(&mut self) {
        self.registry.release(&self.name);
    }
}

/// Cancellable handle yielding change events
pub struct Subscription {
    name: String,
    events: mpsc::Receiver<ChangeEvent>,
    task: JoinHandle<()>,
    _guard: ChannelGuard,
}

impl Subscription {
    pub fn new(
        name: String,
        events: mpsc::Receiver<ChangeEvent>,
        task: JoinHandle<()>,
        guard: ChannelGuard,
    ) -> Self {
        Self {
            name,
            events,
            task,
            _guard: guard,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Next event, or `None` once the source has closed
    pub async fn next_event(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    /// Stop delivery and deregister the channel
    pub fn cancel(self) {
        log::debug!("Cancelling subscription {}", self.name);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl Stream for Subscription {
    type Item = ChangeEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().events.poll_recv(cx)
    }
}
