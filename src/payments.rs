/// Payment orders for coin packs and premium plans
///
/// Orders are created before handing off to the payment gateway and settled
/// when the gateway reports back. Settling a coin order credits the pack
/// through the ledger.

use crate::error::LedgerError;
use crate::ledger::LedgerService;
use crate::models::{AccountId, CoinPack, EntryCategory, ItemType, OrderStatus, PaymentOrder};
use crate::store::{self, tables, Filter, Query, RecordStore};
use crate::Result;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

pub const DEFAULT_CURRENCY: &str = "INR";

#[derive(Clone)]
pub struct Payments {
    store: Arc<dyn RecordStore>,
    ledger: LedgerService,
}

impl Payments {
    pub fn new(store: Arc<dyn RecordStore>, ledger: LedgerService) -> Self {
        Self { store, ledger }
    }

    pub async fn create_order(
        &self,
        account: AccountId,
        amount: u64,
        item_type: ItemType,
        item_id: Uuid,
    ) -> Result<PaymentOrder> {
        let now = Utc::now();
        let order = PaymentOrder {
            id: Uuid::new_v4(),
            user_id: account,
            gateway_order_id: format!("order_{}", now.timestamp_millis()),
            amount,
            currency: DEFAULT_CURRENCY.to_string(),
            status: OrderStatus::Created,
            item_type,
            item_id,
            created_at: now,
            payment_id: None,
        };
        let order = store::insert_record(self.store.as_ref(), tables::ORDERS, &order).await?;
        log::info!("Created payment order {} for {}", order.gateway_order_id, account);
        Ok(order)
    }

    pub async fn get_order(&self, id: Uuid) -> Result<PaymentOrder> {
        store::fetch_one(
            self.store.as_ref(),
            tables::ORDERS,
            Query::new().eq("id", json!(id)),
            id,
        )
        .await
    }

    pub async fn update_order_status(
        &self,
        id: Uuid,
        status: OrderStatus,
        payment_id: Option<&str>,
    ) -> Result<PaymentOrder> {
        let mut patch = json!({ "status": status });
        if let (Some(payment_id), Value::Object(fields)) = (payment_id, &mut patch) {
            fields.insert("payment_id".to_string(), json!(payment_id));
        }
        store::update_one(
            self.store.as_ref(),
            tables::ORDERS,
            &Filter::new().eq("id", json!(id)),
            patch,
            id,
        )
        .await
    }

    /// Mark a coin order paid and credit the pack (coins + bonus)
    ///
    /// The order is claimed with a conditional write on `status`, so only one
    /// settlement of an order can credit the pack. If the credit fails the
    /// claim is released and the order can be settled again.
    pub async fn complete_coin_purchase(&self, order_id: Uuid, payment_id: &str) -> Result<PaymentOrder> {
        let order = self.get_order(order_id).await?;
        if order.item_type != ItemType::Coins {
            return Err(LedgerError::InvalidRecord(format!(
                "order {} is not a coin purchase",
                order.gateway_order_id
            )));
        }

        let pack: CoinPack = store::fetch_one(
            self.store.as_ref(),
            tables::PACKS,
            Query::new().eq("id", json!(order.item_id)),
            order.item_id,
        )
        .await?;

        let claimed = self
            .store
            .compare_and_swap(
                tables::ORDERS,
                order_id,
                "status",
                json!(OrderStatus::Created),
                json!(OrderStatus::Paid),
            )
            .await?;
        if !claimed {
            return Err(LedgerError::Conflict(format!(
                "order {} already settled",
                order.gateway_order_id
            )));
        }

        let settled: Result<PaymentOrder> = async {
            let order = self
                .update_order_status(order_id, OrderStatus::Paid, Some(payment_id))
                .await?;
            self.ledger
                .credit(
                    order.user_id,
                    pack.total_coins(),
                    EntryCategory::Purchase,
                    &format!("Purchased {}", pack.name),
                )
                .await?;
            Ok(order)
        }
        .await;

        if let Err(e) = &settled {
            log::warn!(
                "Crediting order {} failed, releasing it: {}",
                order.gateway_order_id,
                e
            );
            self.release_claim(order_id).await;
        }
        settled
    }

    async fn release_claim(&self, order_id: Uuid) {
        let released = self
            .store
            .compare_and_swap(
                tables::ORDERS,
                order_id,
                "status",
                json!(OrderStatus::Paid),
                json!(OrderStatus::Created),
            )
            .await;
        match released {
            Ok(true) => {}
            Ok(false) => log::error!("Order {} changed status while settling", order_id),
            Err(e) => log::error!("Failed to release order {}: {}", order_id, e),
        }
    }
}
