/// In-process record store
///
/// Holds rows per table in insertion order and fans changes out over a
/// broadcast channel. Conditional writes are atomic with respect to every
/// other call on the same store.

use super::{Filter, Query, RecordStore};
use crate::error::LedgerError;
use crate::subscription::{
    ChangeEvent, ChangeKind, ChannelRegistry, ChannelSpec, Subscription, SUBSCRIPTION_BUFFER,
};
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{PoisonError, RwLock};
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

/// Changes retained for polling clients
const CHANGE_LOG_CAPACITY: usize = 1024;
const BROADCAST_CAPACITY: usize = 256;

#[derive(Default)]
struct Tables {
    rows: HashMap<String, Vec<Value>>,
    seq: u64,
    log: VecDeque<ChangeEvent>,
}

impl Tables {
    fn record_change(&mut self, table: &str, kind: ChangeKind, record: Value) -> ChangeEvent {
        self.seq += 1;
        let event = ChangeEvent {
            seq: self.seq,
            table: table.to_string(),
            kind,
            record,
        };
        if self.log.len() == CHANGE_LOG_CAPACITY {
            self.log.pop_front();
        }
        self.log.push_back(event.clone());
        event
    }
}

pub struct MemoryStore {
    tables: RwLock<Tables>,
    changes: broadcast::Sender<ChangeEvent>,
    registry: ChannelRegistry,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            tables: RwLock::new(Tables::default()),
            changes,
            registry: ChannelRegistry::new(),
        }
    }

    /// Channels with a live subscription
    pub fn active_channels(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Retained changes with `seq > after`, plus the newest sequence number
    pub fn changes_since(&self, after: u64, limit: usize) -> (Vec<ChangeEvent>, u64) {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        let events = tables
            .log
            .iter()
            .filter(|e| e.seq > after)
            .take(limit)
            .cloned()
            .collect();
        (events, tables.seq)
    }

    /// Number of rows in a table
    pub fn row_count(&self, table: &str) -> usize {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        tables.rows.get(table).map_or(0, Vec::len)
    }

    fn publish(&self, event: ChangeEvent) {
        // No receivers is the normal case when nobody subscribed
        let _ = self.changes.send(event);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn id_of(row: &Value) -> Option<&str> {
    row.get("id").and_then(Value::as_str)
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert(&self, table: &str, mut record: Value) -> Result<Value> {
        let fields = record
            .as_object_mut()
            .ok_or_else(|| LedgerError::InvalidRecord(format!("{} row must be an object", table)))?;
        fields
            .entry("id")
            .or_insert_with(|| json!(Uuid::new_v4()));
        fields
            .entry("created_at")
            .or_insert_with(|| json!(Utc::now()));

        let event = {
            let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
            let rows = tables.rows.entry(table.to_string()).or_default();
            if let Some(id) = id_of(&record) {
                if rows.iter().any(|row| id_of(row) == Some(id)) {
                    return Err(LedgerError::Conflict(format!(
                        "duplicate id {} in {}",
                        id, table
                    )));
                }
            }
            rows.push(record.clone());
            tables.record_change(table, ChangeKind::Insert, record.clone())
        };
        self.publish(event);
        Ok(record)
    }

    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        Ok(tables
            .rows
            .get(table)
            .map(|rows| query.apply(rows))
            .unwrap_or_default())
    }

    async fn update(&self, table: &str, filter: &Filter, patch: Value) -> Result<Vec<Value>> {
        let patch = match patch {
            Value::Object(fields) => fields,
            _ => {
                return Err(LedgerError::InvalidRecord(format!(
                    "{} patch must be an object",
                    table
                )))
            }
        };

        let mut updated = Vec::new();
        let events: Vec<ChangeEvent> = {
            let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
            if let Some(rows) = tables.rows.get_mut(table) {
                for row in rows.iter_mut().filter(|row| filter.matches(row)) {
                    if let Some(fields) = row.as_object_mut() {
                        for (key, value) in &patch {
                            fields.insert(key.clone(), value.clone());
                        }
                    }
                    updated.push(row.clone());
                }
            }
            updated
                .iter()
                .map(|row| tables.record_change(table, ChangeKind::Update, row.clone()))
                .collect()
        };
        for event in events {
            self.publish(event);
        }
        Ok(updated)
    }

    async fn compare_and_swap(
        &self,
        table: &str,
        id: Uuid,
        field: &str,
        expected: Value,
        new: Value,
    ) -> Result<bool> {
        let id_str = id.to_string();
        let event = {
            let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
            let row = tables
                .rows
                .get_mut(table)
                .and_then(|rows| rows.iter_mut().find(|row| id_of(row) == Some(id_str.as_str())))
                .ok_or_else(|| LedgerError::not_found(table, id))?;

            let current = row.get(field).unwrap_or(&Value::Null);
            if super::compare_values(current, &expected) != Some(std::cmp::Ordering::Equal) {
                return Ok(false);
            }
            if let Some(fields) = row.as_object_mut() {
                fields.insert(field.to_string(), new);
            }
            let snapshot = row.clone();
            tables.record_change(table, ChangeKind::Update, snapshot)
        };
        self.publish(event);
        Ok(true)
    }

    async fn subscribe(&self, channel: ChannelSpec) -> Result<Subscription> {
        let guard = self.registry.register(&channel.name);
        let mut source = self.changes.subscribe();
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let name = channel.name.clone();

        let task = tokio::spawn(async move {
            loop {
                match source.recv().await {
                    Ok(event) => {
                        if channel.matches(&event) && tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        log::warn!("Channel {} lagged, skipped {} change(s)", channel.name, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(Subscription::new(name, rx, task, guard))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tables;

    #[tokio::test]
    async fn insert_fills_identity_and_rejects_duplicates() {
        let store = MemoryStore::new();
        let row = store
            .insert(tables::USERS, json!({"coins": 0}))
            .await
            .unwrap();
        assert!(row["id"].is_string());
        assert!(row["created_at"].is_string());

        let err = store.insert(tables::USERS, row).await.unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));
    }

    #[tokio::test]
    async fn compare_and_swap_checks_current_value() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        store
            .insert(tables::USERS, json!({"id": id, "coins": 100}))
            .await
            .unwrap();

        assert!(!store
            .compare_and_swap(tables::USERS, id, "coins", json!(90), json!(80))
            .await
            .unwrap());
        assert!(store
            .compare_and_swap(tables::USERS, id, "coins", json!(100), json!(80))
            .await
            .unwrap());

        let rows = store
            .select(tables::USERS, &Query::new().eq("id", json!(id)))
            .await
            .unwrap();
        assert_eq!(rows[0]["coins"], 80);

        let missing = store
            .compare_and_swap(tables::USERS, Uuid::new_v4(), "coins", json!(0), json!(1))
            .await
            .unwrap_err();
        assert!(matches!(missing, LedgerError::NotFound { .. }));
    }

    #[tokio::test]
    async fn change_log_is_sequenced() {
        let store = MemoryStore::new();
        store.insert("t", json!({"n": 1})).await.unwrap();
        store
            .update("t", &Filter::new().eq("n", json!(1)), json!({"n": 2}))
            .await
            .unwrap();

        let (events, latest) = store.changes_since(0, 10);
        assert_eq!(latest, 2);
        assert_eq!(events[0].kind, ChangeKind::Insert);
        assert_eq!(events[1].kind, ChangeKind::Update);
        assert_eq!(events[1].record["n"], 2);

        let (after_first, _) = store.changes_since(1, 10);
        assert_eq!(after_first.len(), 1);
    }
}
