/// Catalog seeding from TOML
///
/// A fresh store gets the premium plans, coin packs and app config rows
/// listed in `seed.toml` (or the file named by `SEED_FILE`).

use ajnabi_ledger::{tables, AppConfig, CoinPack, LedgerError, MemoryStore, PremiumPlan, RecordStore};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

/// Catalog bundled with the binary
pub const DEFAULT_SEED: &str = include_str!("../seed.toml");

#[derive(Error, Debug)]
pub enum SeedError {
    #[error("Failed to read seed file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid seed file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid {table} row: {message}")]
    InvalidRow { table: &'static str, message: String },

    #[error("Store rejected seed row: {0}")]
    Store(#[from] LedgerError),
}

#[derive(Debug, Default, Deserialize)]
pub struct SeedCatalog {
    #[serde(default)]
    pub premium_plans: Vec<Value>,
    #[serde(default)]
    pub coin_packs: Vec<Value>,
    #[serde(default)]
    pub app_config: Option<Value>,
}

/// Rows written by [`SeedCatalog::apply`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub premium_plans: usize,
    pub coin_packs: usize,
    pub app_config: bool,
}

impl SeedCatalog {
    pub fn parse(source: &str) -> Result<Self, SeedError> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SeedError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| SeedError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&source)
    }

    pub fn bundled() -> Result<Self, SeedError> {
        Self::parse(DEFAULT_SEED)
    }

    /// Insert every row, rejecting rows the clients could not read back
    pub async fn apply(&self, store: &MemoryStore) -> Result<SeedSummary, SeedError> {
        for plan in &self.premium_plans {
            insert_checked::<PremiumPlan>(store, tables::PLANS, plan).await?;
        }
        for pack in &self.coin_packs {
            insert_checked::<CoinPack>(store, tables::PACKS, pack).await?;
        }
        if let Some(config) = &self.app_config {
            insert_checked::<AppConfig>(store, tables::APP_CONFIG, config).await?;
        }

        let summary = SeedSummary {
            premium_plans: self.premium_plans.len(),
            coin_packs: self.coin_packs.len(),
            app_config: self.app_config.is_some(),
        };
        log::info!(
            "🌱 Seeded {} premium plan(s), {} coin pack(s){}",
            summary.premium_plans,
            summary.coin_packs,
            if summary.app_config { " and app config" } else { "" }
        );
        Ok(summary)
    }
}

async fn insert_checked<T: DeserializeOwned>(
    store: &MemoryStore,
    table: &'static str,
    row: &Value,
) -> Result<(), SeedError> {
    let stored = store.insert(table, row.clone()).await?;
    serde_json::from_value::<T>(stored).map_err(|e| SeedError::InvalidRow {
        table,
        message: e.to_string(),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ajnabi_ledger::Catalog;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_bundled_catalog_loads() {
        let store = Arc::new(MemoryStore::new());
        let summary = SeedCatalog::bundled().unwrap().apply(&store).await.unwrap();
        assert_eq!(
            summary,
            SeedSummary {
                premium_plans: 4,
                coin_packs: 3,
                app_config: true,
            }
        );

        let catalog = Catalog::new(store.clone());
        let plans = catalog.premium_plans().await.unwrap();
        assert_eq!(plans[0].name, "1-Day Premium");
        assert_eq!(plans[3].duration_days, None);

        let packs = catalog.coin_packs().await.unwrap();
        assert_eq!(packs[2].total_coins(), 400);
        assert!(packs[1].is_popular);

        assert_eq!(catalog.app_config().await.unwrap(), AppConfig::default());
    }

    #[tokio::test]
    async fn test_row_missing_columns_is_rejected() {
        let catalog = SeedCatalog::parse("[[coin_packs]]\nname = \"Broken\"\n").unwrap();
        let err = catalog.apply(&MemoryStore::new()).await.unwrap_err();
        assert!(matches!(err, SeedError::InvalidRow { table: "coin_packs", .. }));
    }

    #[test]
    fn test_empty_seed_is_valid() {
        let catalog = SeedCatalog::parse("").unwrap();
        assert!(catalog.premium_plans.is_empty());
        assert!(catalog.app_config.is_none());
    }
}
