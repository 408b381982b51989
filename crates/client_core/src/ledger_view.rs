use std::sync::Arc;

use shared::{
    domain::TransactionId,
    protocol::{Balance, LedgerResponse, Transaction},
};
use tracing::{info, warn};

use crate::{error::LedgerError, service::TransactionService};

/// Balance and transactions taken from a single service response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub balance: Balance,
    pub transactions: Vec<Transaction>,
}

impl From<LedgerResponse> for LedgerSnapshot {
    fn from(value: LedgerResponse) -> Self {
        Self {
            balance: value.balance,
            transactions: value.transactions,
        }
    }
}

/// Client-side ledger state with load and delete-then-reload operations.
pub struct LedgerView {
    service: Arc<dyn TransactionService>,
    snapshot: Option<LedgerSnapshot>,
    last_error: Option<String>,
}

impl LedgerView {
    pub fn new(service: Arc<dyn TransactionService>) -> Self {
        Self {
            service,
            snapshot: None,
            last_error: None,
        }
    }

    pub fn snapshot(&self) -> Option<&LedgerSnapshot> {
        self.snapshot.as_ref()
    }

    /// Transactions in server order; empty until the first successful load.
    pub fn transactions(&self) -> &[Transaction] {
        self.snapshot
            .as_ref()
            .map(|snapshot| snapshot.transactions.as_slice())
            .unwrap_or_default()
    }

    /// `None` while nothing has been loaded yet.
    pub fn balance(&self) -> Option<&Balance> {
        self.snapshot.as_ref().map(|snapshot| &snapshot.balance)
    }

    pub fn is_loaded(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Message of the most recent failed operation, cleared by a successful load.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub async fn load(&mut self) -> Result<(), LedgerError> {
        match self.service.fetch_ledger().await {
            Ok(response) => {
                let snapshot = LedgerSnapshot::from(response);
                info!(
                    transactions = snapshot.transactions.len(),
                    total = %snapshot.balance.total,
                    "ledger loaded"
                );
                self.snapshot = Some(snapshot);
                self.last_error = None;
                Ok(())
            }
            Err(source) => {
                warn!("ledger load failed: {source:#}");
                let err = LedgerError::LoadFailure { source };
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Deletes `id` on the service and, only on success, reloads the ledger.
    pub async fn delete(&mut self, id: &TransactionId) -> Result<(), LedgerError> {
        if let Err(source) = self.service.delete_transaction(id).await {
            warn!(%id, "transaction delete failed: {source:#}");
            let err = LedgerError::DeleteFailure {
                id: id.clone(),
                source,
            };
            self.last_error = Some(err.to_string());
            return Err(err);
        }

        info!(%id, "transaction deleted, reloading ledger");
        self.load().await
    }
}

#[cfg(test)]
#[path = "tests/ledger_view_tests.rs"]
mod tests;
