/// HTTP client for a remotely hosted record store
///
/// Talks to the REST surface served by `record-store-mock` (or any server
/// speaking the same shapes, see [`super::wire`]). Subscriptions poll the
/// change feed on a fixed interval.

use super::wire::{CasRequest, CasResponse, ChangesResponse, ErrorBody, UpdateRequest};
use super::{Filter, Query, RecordStore};
use crate::error::LedgerError;
use crate::subscription::{ChannelRegistry, ChannelSpec, Subscription, SUBSCRIPTION_BUFFER};
use crate::Result;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct HttpStore {
    client: reqwest::Client,
    base_url: String,
    poll_interval: Duration,
    registry: ChannelRegistry,
}

impl HttpStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            registry: ChannelRegistry::new(),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Channels with a live subscription
    pub fn active_channels(&self) -> Vec<String> {
        self.registry.names()
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/{}", self.base_url, table)
    }

    async fn fetch_changes(
        client: &reqwest::Client,
        base_url: &str,
        after: u64,
    ) -> Result<ChangesResponse> {
        let response = client
            .get(format!("{}/changes", base_url))
            .query(&[("after", after)])
            .send()
            .await?;
        read_json(response, "changes").await
    }
}

/// Decode a success body or map the status to a `LedgerError`
async fn read_json<T: DeserializeOwned>(response: reqwest::Response, table: &str) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status.to_string(),
    };
    Err(match status {
        StatusCode::NOT_FOUND => LedgerError::not_found(table, message),
        StatusCode::CONFLICT => LedgerError::Conflict(message),
        StatusCode::BAD_REQUEST => LedgerError::InvalidRecord(message),
        _ => LedgerError::InvalidResponse(format!("{}: {}", status, message)),
    })
}

#[async_trait]
impl RecordStore for HttpStore {
    async fn insert(&self, table: &str, record: Value) -> Result<Value> {
        let response = self
            .client
            .post(self.table_url(table))
            .json(&record)
            .send()
            .await?;
        read_json(response, table).await
    }

    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>> {
        let response = self
            .client
            .post(format!("{}/query", self.table_url(table)))
            .json(query)
            .send()
            .await?;
        read_json(response, table).await
    }

    async fn update(&self, table: &str, filter: &Filter, patch: Value) -> Result<Vec<Value>> {
        let body = UpdateRequest {
            filter: filter.clone(),
            patch,
        };
        let response = self
            .client
            .patch(self.table_url(table))
            .json(&body)
            .send()
            .await?;
        read_json(response, table).await
    }

    async fn compare_and_swap(
        &self,
        table: &str,
        id: Uuid,
        field: &str,
        expected: Value,
        new: Value,
    ) -> Result<bool> {
        let body = CasRequest {
            field: field.to_string(),
            expected,
            new,
        };
        let response = self
            .client
            .post(format!("{}/{}/cas", self.table_url(table), id))
            .json(&body)
            .send()
            .await?;
        let result: CasResponse = read_json(response, table).await?;
        Ok(result.swapped)
    }

    async fn subscribe(&self, channel: ChannelSpec) -> Result<Subscription> {
        // Start from the current head so only new changes are delivered
        let head = Self::fetch_changes(&self.client, &self.base_url, u64::MAX).await?;
        let guard = self.registry.register(&channel.name);
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let name = channel.name.clone();

        let client = self.client.clone();
        let base_url = self.base_url.clone();
        let poll_interval = self.poll_interval;
        let mut cursor = head.latest_seq;

        let task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(poll_interval).await;
                let changes = match Self::fetch_changes(&client, &base_url, cursor).await {
                    Ok(changes) => changes,
                    Err(e) => {
                        log::warn!("Change feed poll failed for {}: {}", channel.name, e);
                        continue;
                    }
                };
                for event in changes.events {
                    cursor = cursor.max(event.seq);
                    if channel.matches(&event) && tx.send(event).await.is_err() {
                        return;
                    }
                }
            }
        });

        Ok(Subscription::new(name, rx, task, guard))
    }
}
