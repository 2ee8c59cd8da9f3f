/// Backend facade
///
/// Bundles every record-store client over one shared store handle.

use crate::accounts::Accounts;
use crate::calls::Calls;
use crate::catalog::Catalog;
use crate::ledger::LedgerService;
use crate::payments::Payments;
use crate::store::RecordStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct Backend {
    pub ledger: LedgerService,
    pub accounts: Accounts,
    pub catalog: Catalog,
    pub payments: Payments,
    pub calls: Calls,
}

impl Backend {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self::with_ledger(store.clone(), LedgerService::new(store))
    }

    /// Use a preconfigured ledger (e.g. a custom conflict retry budget)
    pub fn with_ledger(store: Arc<dyn RecordStore>, ledger: LedgerService) -> Self {
        Self {
            accounts: Accounts::new(store.clone(), ledger.clone()),
            catalog: Catalog::new(store.clone()),
            payments: Payments::new(store.clone(), ledger.clone()),
            calls: Calls::new(store),
            ledger,
        }
    }
}
