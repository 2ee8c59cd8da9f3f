/// Premium plans, coin packs and app-wide tunables

use crate::error::LedgerError;
use crate::models::{AppConfig, CoinPack, PremiumPlan};
use crate::store::{self, tables, Direction, Query, RecordStore};
use crate::Result;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct Catalog {
    store: Arc<dyn RecordStore>,
}

impl Catalog {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Plans currently offered, cheapest first
    pub async fn premium_plans(&self) -> Result<Vec<PremiumPlan>> {
        let query = Query::new()
            .eq("is_active", json!(true))
            .order_by("price_inr", Direction::Asc);
        store::fetch_all(self.store.as_ref(), tables::PLANS, &query).await
    }

    pub async fn coin_packs(&self) -> Result<Vec<CoinPack>> {
        let query = Query::new().order_by("price_inr", Direction::Asc);
        store::fetch_all(self.store.as_ref(), tables::PACKS, &query).await
    }

    pub async fn coin_pack(&self, id: Uuid) -> Result<CoinPack> {
        store::fetch_one(
            self.store.as_ref(),
            tables::PACKS,
            Query::new().eq("id", json!(id)),
            id,
        )
        .await
    }

    /// Newest config row, or the built-in defaults when none exists
    pub async fn app_config(&self) -> Result<AppConfig> {
        let query = Query::new().order_by("created_at", Direction::Desc);
        match store::fetch_one(self.store.as_ref(), tables::APP_CONFIG, query, "latest").await {
            Ok(config) => Ok(config),
            Err(LedgerError::NotFound { .. }) => {
                log::debug!("No app config row, using defaults");
                Ok(AppConfig::default())
            }
            Err(e) => Err(e),
        }
    }
}
